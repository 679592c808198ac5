use super::float::{DEFAULT_SIGNIFICANT_DIGITS, encode_float};
use crate::domain::{EncodingError, FieldValue, Measurement};
use std::fmt::Write;

const MEASUREMENT_SPECIAL: &[char] = &[',', ' '];
const KEY_SPECIAL: &[char] = &[',', '=', ' '];

/// Renders measurements as InfluxDB line protocol.
///
/// ```text
/// ue_info,host=ue1,testbed=lab dl_mcs=27.00,nof_users=1i 1700000000000000000
/// ```
#[derive(Debug, Clone, Copy)]
pub struct LineProtocolEncoder {
    significant_digits: u32,
}

impl LineProtocolEncoder {
    pub fn new(significant_digits: u32) -> Self {
        Self { significant_digits }
    }

    pub fn significant_digits(&self) -> u32 {
        self.significant_digits
    }

    pub fn encode(&self, measurement: &Measurement) -> Result<String, EncodingError> {
        if measurement.fields.is_empty() {
            return Err(EncodingError::NoFields(measurement.name.clone()));
        }

        let mut line = String::with_capacity(64 + 24 * measurement.fields.len());

        push_escaped(&mut line, &measurement.name, "measurement", MEASUREMENT_SPECIAL)?;

        for (key, value) in &measurement.tags {
            line.push(',');
            push_escaped(&mut line, key, "tag key", KEY_SPECIAL)?;
            line.push('=');
            push_escaped(&mut line, value, "tag value", KEY_SPECIAL)?;
        }

        line.push(' ');
        for (index, (key, value)) in measurement.fields.iter().enumerate() {
            if index > 0 {
                line.push(',');
            }
            push_escaped(&mut line, key, "field key", KEY_SPECIAL)?;
            line.push('=');
            self.push_field_value(&mut line, key, value)?;
        }

        // Writing into a String cannot fail.
        let _ = write!(line, " {}", measurement.timestamp);
        Ok(line)
    }

    /// Encode a set of measurements into one request body, one line each.
    pub fn encode_batch(&self, measurements: &[Measurement]) -> Result<String, EncodingError> {
        let lines = measurements
            .iter()
            .map(|measurement| self.encode(measurement))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lines.join("\n"))
    }

    fn push_field_value(
        &self,
        out: &mut String,
        key: &str,
        value: &FieldValue,
    ) -> Result<(), EncodingError> {
        match value {
            FieldValue::Integer(n) => {
                let _ = write!(out, "{n}i");
            }
            FieldValue::Float(f) => {
                let rendered = encode_float(*f, self.significant_digits).map_err(|_| {
                    EncodingError::NonFinite {
                        field: key.to_string(),
                        value: *f,
                    }
                })?;
                out.push_str(&rendered);
                // A bare integer would still be a float to the database, but keep
                // the decimal point so the line reads unambiguously.
                if !rendered.contains('.') {
                    out.push_str(".0");
                }
            }
            FieldValue::Text(text) => {
                if text.contains(['\n', '\r']) {
                    return Err(EncodingError::InvalidCharacter {
                        what: "field value",
                        value: text.clone(),
                    });
                }
                out.push('"');
                for c in text.chars() {
                    if c == '"' || c == '\\' {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push('"');
            }
        }
        Ok(())
    }
}

impl Default for LineProtocolEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNIFICANT_DIGITS)
    }
}

/// Encode one measurement with the default digit budget.
pub fn encode_line_protocol(measurement: &Measurement) -> Result<String, EncodingError> {
    LineProtocolEncoder::default().encode(measurement)
}

fn push_escaped(
    out: &mut String,
    value: &str,
    what: &'static str,
    special: &[char],
) -> Result<(), EncodingError> {
    if value.is_empty() {
        return Err(EncodingError::Empty { what });
    }
    if value.contains(['\n', '\r']) || has_dangling_backslash(value, special) {
        return Err(EncodingError::InvalidCharacter {
            what,
            value: value.to_string(),
        });
    }

    for c in value.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    Ok(())
}

/// A backslash at the end, or in front of a separator, would swallow the
/// separator the encoder emits next.
fn has_dangling_backslash(value: &str, special: &[char]) -> bool {
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                None => return true,
                Some(next) if special.contains(next) => return true,
                Some(_) => {}
            }
        }
    }
    false
}
