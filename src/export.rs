/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The DynamoDB-JSON shapes found in an export's data objects.
//!
//! Each line of a (decompressed) data object is one [`ExportRecord`]:
//! `{"Item": {"<attribute>": {"<type tag>": ...}, ...}}`. The serde
//! externally-tagged enum representation matches the wire format directly,
//! so no custom (de)serialization code is needed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One tagged attribute value of the export format.
///
/// This is a closed set: DynamoDB defines exactly these ten types. Binary
/// payloads (`B`/`BS`) stay base64-encoded until conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExportValue {
    /// `NULL`
    #[serde(rename = "NULL")]
    Null(bool),
    /// `BOOL`
    #[serde(rename = "BOOL")]
    Bool(bool),
    /// `B`, base64-encoded
    #[serde(rename = "B")]
    Binary(String),
    /// `N`, kept as the decimal string DynamoDB uses
    #[serde(rename = "N")]
    Number(String),
    /// `S`
    #[serde(rename = "S")]
    String(String),
    /// `BS`, each element base64-encoded
    #[serde(rename = "BS")]
    BinarySet(Vec<String>),
    /// `NS`
    #[serde(rename = "NS")]
    NumberSet(Vec<String>),
    /// `SS`
    #[serde(rename = "SS")]
    StringSet(Vec<String>),
    /// `L`
    #[serde(rename = "L")]
    List(Vec<ExportValue>),
    /// `M`
    #[serde(rename = "M")]
    Map(HashMap<String, ExportValue>),
}

impl ExportValue {
    /// The DynamoDB type tag of this value.
    pub fn type_tag(&self) -> &'static str {
        match self {
            ExportValue::Null(_) => "NULL",
            ExportValue::Bool(_) => "BOOL",
            ExportValue::Binary(_) => "B",
            ExportValue::Number(_) => "N",
            ExportValue::String(_) => "S",
            ExportValue::BinarySet(_) => "BS",
            ExportValue::NumberSet(_) => "NS",
            ExportValue::StringSet(_) => "SS",
            ExportValue::List(_) => "L",
            ExportValue::Map(_) => "M",
        }
    }
}

/// One line of a data object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    /// The exported item's attribute map.
    #[serde(rename = "Item")]
    pub item: HashMap<String, ExportValue>,
}
