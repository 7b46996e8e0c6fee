/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Conversion from the export's tagged values to the SDK's native
//! [`AttributeValue`], plus the scalar stringify used for hash key grouping.

use crate::error::Error;
use crate::export::ExportValue;
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::collections::HashMap;

/// Convert a whole exported item into a native attribute map.
pub fn to_item(item: &HashMap<String, ExportValue>) -> Result<HashMap<String, AttributeValue>, Error> {
    item.iter()
        .map(|(name, value)| Ok((name.clone(), to_attribute_value(value)?)))
        .collect()
}

/// Convert one exported value into a native [`AttributeValue`].
///
/// Exhaustive over the closed set of DynamoDB types; the only failure mode
/// is a binary payload that is not valid base64.
pub fn to_attribute_value(value: &ExportValue) -> Result<AttributeValue, Error> {
    Ok(match value {
        ExportValue::Null(is_null) => AttributeValue::Null(*is_null),
        ExportValue::Bool(b) => AttributeValue::Bool(*b),
        ExportValue::Binary(b64) => AttributeValue::B(Blob::new(decode_binary(b64)?)),
        ExportValue::Number(n) => AttributeValue::N(n.clone()),
        ExportValue::String(s) => AttributeValue::S(s.clone()),
        ExportValue::BinarySet(set) => AttributeValue::Bs(
            set.iter()
                .map(|b64| Ok(Blob::new(decode_binary(b64)?)))
                .collect::<Result<_, Error>>()?,
        ),
        ExportValue::NumberSet(set) => AttributeValue::Ns(set.clone()),
        ExportValue::StringSet(set) => AttributeValue::Ss(set.clone()),
        ExportValue::List(values) => AttributeValue::L(
            values
                .iter()
                .map(to_attribute_value)
                .collect::<Result<_, Error>>()?,
        ),
        ExportValue::Map(map) => AttributeValue::M(to_item(map)?),
    })
}

/// Render a scalar value as the string used to group items by hash key.
///
/// Defined for the five scalar types only; document types and sets cannot be
/// key attributes and fail the enclosing shard.
pub fn stringify(value: &ExportValue) -> Result<String, Error> {
    match value {
        ExportValue::Null(_) => Ok(String::new()),
        ExportValue::Bool(b) => Ok(b.to_string()),
        ExportValue::Binary(b64) => {
            Ok(String::from_utf8_lossy(&decode_binary(b64)?).into_owned())
        }
        ExportValue::Number(n) => Ok(n.clone()),
        ExportValue::String(s) => Ok(s.clone()),
        other => Err(Error::NonScalarKey {
            found: other.type_tag(),
        }),
    }
}

fn decode_binary(b64: &str) -> Result<Vec<u8>, Error> {
    BASE64.decode(b64).map_err(Error::InvalidBinary)
}
