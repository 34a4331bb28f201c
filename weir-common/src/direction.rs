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

use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transfer direction of a request body or response body, named from the
/// client's point of view. Uploads are request payloads (PUT/POST), all
/// other verbs count as downloads.
#[derive(Serialize, Deserialize, Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub enum Direction {
    Up,
    Dwn,
}

impl Direction {
    /// The wire name used in event lines, policy messages and KV keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Dwn => "dwn",
        }
    }

    pub fn for_verb(verb: &str) -> Self {
        if verb == "PUT" || verb == "POST" {
            Direction::Up
        } else {
            Direction::Dwn
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq)]
pub struct UnknownDirection(pub String);

impl fmt::Display for UnknownDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown transfer direction '{}'", self.0)
    }
}

impl std::error::Error for UnknownDirection {}

impl FromStr for Direction {
    type Err = UnknownDirection;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Direction::Up),
            "dwn" => Ok(Direction::Dwn),
            other => Err(UnknownDirection(other.to_string())),
        }
    }
}
