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

/// A copy-free tokenizer over a multi-character delimiter.
///
/// Unlike [`str::split`], excess calls to [`next`](Split::next) after the
/// input is exhausted poison the split, so a caller reading a fixed number
/// of fields can verify the exact field count with one final
/// [`finished`](Split::finished) check.
///
/// Adjacent delimiters yield empty segments, as do leading and trailing
/// ones, so joining the segments back on the delimiter reproduces the
/// input.
pub struct Split<'a> {
    input: &'a str,
    delimiter: &'a str,
    index: usize,
    error: bool,
    eof: bool,
}

impl<'a> Split<'a> {
    pub fn new(input: &'a str, delimiter: &'a str) -> Self {
        Self {
            input,
            delimiter,
            index: 0,
            // An empty delimiter would never advance
            error: delimiter.is_empty(),
            eof: false,
        }
    }

    /// The next segment, or `""` once the input is exhausted (which also
    /// marks the split as failed).
    pub fn next(&mut self) -> &'a str {
        if self.error || self.eof {
            self.error = true;
            return "";
        }
        let rest = &self.input[self.index..];
        match rest.find(self.delimiter) {
            Some(pos) => {
                self.index += pos + self.delimiter.len();
                &rest[..pos]
            }
            None => {
                self.eof = true;
                rest
            }
        }
    }

    /// True when every segment has been consumed by [`next`](Split::next),
    /// with no excess calls.
    pub fn finished(&self) -> bool {
        self.eof && !self.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(input: &str, delimiter: &str) -> Vec<String> {
        let mut split = Split::new(input, delimiter);
        let mut out = Vec::new();
        loop {
            out.push(split.next().to_string());
            if split.finished() || out.len() > 64 {
                break;
            }
        }
        out
    }

    #[test]
    fn splits_on_multi_char_delimiters() {
        assert_eq!(
            collect("req~|~1.2.3.4:58840~|~AKIA", "~|~"),
            vec!["req", "1.2.3.4:58840", "AKIA"]
        );
    }

    #[test]
    fn adjacent_delimiters_yield_empty_segments() {
        assert_eq!(collect("foo_bar__baz", "_"), vec!["foo", "bar", "", "baz"]);
    }

    #[test]
    fn leading_and_trailing_delimiters_yield_empty_segments() {
        assert_eq!(collect("_a_", "_"), vec!["", "a", ""]);
    }

    #[test]
    fn rejoining_reproduces_the_input() {
        for input in &["a,b,,c", ",x,", "", "one", "a~|~~|~b~|~"] {
            for delimiter in &[",", "~|~"] {
                assert_eq!(collect(input, delimiter).join(delimiter), *input);
            }
        }
    }

    #[test]
    fn excess_next_calls_poison_the_split() {
        let mut split = Split::new("foo_bar", "_");
        assert_eq!(split.next(), "foo");
        assert!(!split.finished());
        assert_eq!(split.next(), "bar");
        assert!(split.finished());
        assert_eq!(split.next(), "");
        assert!(!split.finished());
    }

    #[test]
    fn empty_delimiter_is_an_error() {
        let mut split = Split::new("foo", "");
        assert_eq!(split.next(), "");
        assert!(!split.finished());
    }
}
