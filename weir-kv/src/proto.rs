// Copyright 2020-2024, Wayfair GmbH
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Reply encoding for the store's line protocol. One reply per line, first
//! byte selects the shape. Array items are tab-separated; keys and values
//! in this store never contain tabs or newlines.

use crate::errors::Error;

pub const NIL: &str = "_";

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ok,
    Int(i64),
    Bulk(String),
    Nil,
    Array(Vec<Option<String>>),
    Error(String),
}

impl Reply {
    pub fn encode(&self) -> String {
        match self {
            Reply::Ok => "+OK".to_string(),
            Reply::Int(n) => format!(":{}", n),
            Reply::Bulk(s) => format!("${}", s),
            Reply::Nil => NIL.to_string(),
            Reply::Array(items) => {
                let items: Vec<&str> = items
                    .iter()
                    .map(|item| item.as_deref().unwrap_or(NIL))
                    .collect();
                format!("*{}", items.join("\t"))
            }
            Reply::Error(msg) => format!("-ERR {}", msg),
        }
    }

    pub fn parse(line: &str) -> Result<Self, Error> {
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        if line == NIL {
            return Ok(Reply::Nil);
        }
        let mut chars = line.chars();
        match chars.next() {
            Some('+') => Ok(Reply::Ok),
            Some(':') => chars
                .as_str()
                .parse()
                .map(Reply::Int)
                .map_err(|_| Error::Protocol(format!("bad integer reply '{}'", line))),
            Some('$') => Ok(Reply::Bulk(chars.as_str().to_string())),
            Some('*') => {
                let body = chars.as_str();
                if body.is_empty() {
                    return Ok(Reply::Array(Vec::new()));
                }
                Ok(Reply::Array(
                    body.split('\t')
                        .map(|item| {
                            if item == NIL {
                                None
                            } else {
                                Some(item.to_string())
                            }
                        })
                        .collect(),
                ))
            }
            Some('-') => Ok(Reply::Error(chars.as_str().to_string())),
            _ => Err(Error::Protocol(format!("unrecognized reply '{}'", line))),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replies_round_trip() {
        for reply in &[
            Reply::Ok,
            Reply::Int(42),
            Reply::Int(-7),
            Reply::Bulk("conn_v2_user_up_i_AKIA$dev".into()),
            Reply::Nil,
            Reply::Array(vec![Some("GET".into()), Some("3".into()), None]),
            Reply::Array(Vec::new()),
            Reply::Error("unknown command".into()),
        ] {
            assert_eq!(&Reply::parse(&reply.encode()).unwrap(), reply);
        }
    }

    #[test]
    fn empty_bulk_is_distinct_from_nil() {
        assert_eq!(Reply::parse("$").unwrap(), Reply::Bulk(String::new()));
        assert_eq!(Reply::parse("_").unwrap(), Reply::Nil);
    }

    #[test]
    fn garbage_is_a_protocol_error() {
        assert!(Reply::parse("hello").is_err());
        assert!(Reply::parse(":ten").is_err());
    }
}
