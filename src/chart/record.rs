use super::error::FormatError;

/// Splits one record line into its ordered fields. Empty fields are kept
/// and whitespace is not trimmed; the decoder decides how many fields it
/// cares about, so there is no such thing as too few or too many here.
pub fn tokenize(line: &str, delimiter: char) -> Vec<&str> {
    line.split(delimiter).collect()
}

/// Positional cursor over the fields of one record. Each `next_*` call is
/// one step of the record's schema: it names the field, decodes it, and
/// advances. Reading past the end yields `None` so truncated records fall
/// back to default values instead of failing.
pub struct Record<'a> {
    fields: Vec<&'a str>,
    cursor: usize,
}

impl<'a> Record<'a> {
    pub fn new(line: &'a str, delimiter: char) -> Self {
        Self {
            fields: tokenize(line, delimiter),
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Index of the field the next `next_*` call will read.
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn skip(&mut self, n: usize) {
        self.cursor = (self.cursor + n).min(self.fields.len());
    }

    pub fn next_raw(&mut self) -> Option<&'a str> {
        let field = self.fields.get(self.cursor).copied();
        if field.is_some() {
            self.cursor += 1;
        }
        field
    }

    pub fn next_int(&mut self, name: &'static str) -> Result<Option<i32>, FormatError> {
        let index = self.cursor;
        match self.next_raw() {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| FormatError::new(index, name, raw, "an integer")),
            None => Ok(None),
        }
    }

    pub fn next_float(&mut self, name: &'static str) -> Result<Option<f64>, FormatError> {
        let index = self.cursor;
        match self.next_raw() {
            Some(raw) => match raw.parse::<f64>() {
                Ok(value) if value.is_finite() => Ok(Some(value)),
                _ => Err(FormatError::new(index, name, raw, "a finite number")),
            },
            None => Ok(None),
        }
    }

    /// Decodes a `:`-separated integer list. The source serializer emits a
    /// trailing `:`, so trailing empty segments are tolerated; empty
    /// segments anywhere else are malformed.
    pub fn next_int_list(
        &mut self,
        name: &'static str,
        delimiter: char,
    ) -> Result<Vec<i32>, FormatError> {
        let index = self.cursor;
        let Some(raw) = self.next_raw() else {
            return Ok(Vec::new());
        };

        let mut segments = tokenize(raw, delimiter);
        while segments.last().is_some_and(|s| s.is_empty()) {
            segments.pop();
        }

        segments
            .into_iter()
            .map(|s| {
                s.parse()
                    .map_err(|_| FormatError::new(index, name, raw, "`:`-separated integers"))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tokenize_keeps_empty_fields() {
        assert_eq!(tokenize("a,,c,", ','), vec!["a", "", "c", ""]);
    }

    #[test]
    fn tokenize_does_not_trim() {
        assert_eq!(tokenize(" a , b", ','), vec![" a ", " b"]);
    }

    #[test]
    fn reading_past_the_end_yields_none() {
        let mut record = Record::new("1,2", ',');
        assert_eq!(record.next_int("x").unwrap(), Some(1));
        assert_eq!(record.next_int("y").unwrap(), Some(2));
        assert_eq!(record.next_int("time").unwrap(), None);
        assert_eq!(record.next_int("type").unwrap(), None);
    }

    #[test]
    fn bad_integer_reports_index_and_raw_text() {
        let mut record = Record::new("1,2,abc", ',');
        record.skip(2);
        let err = record.next_int("time").unwrap_err();
        assert_eq!(err.field, 2);
        assert_eq!(err.raw, "abc");
    }

    #[test]
    fn int_list_tolerates_trailing_empty_segments() {
        let mut record = Record::new("0:0:0:0:", ',');
        assert_eq!(record.next_int_list("sample", ':').unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn int_list_rejects_interior_garbage() {
        let mut record = Record::new("0:x:0", ',');
        assert!(record.next_int_list("sample", ':').is_err());
    }

    #[test]
    fn int_list_of_empty_field_is_empty() {
        let mut record = Record::new("", ',');
        assert_eq!(record.next_int_list("sample", ':').unwrap(), Vec::<i32>::new());
    }
}
