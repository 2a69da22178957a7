use crate::error::ParserError;
use crate::limits::ODataLimits;
use crate::metadata::{EntityType, Model};
use crate::query::ODataQuery;
use crate::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Select {
    All,
    Properties(Vec<String>),
}

/// One navigation property of `$expand`, with its nested options.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpandItem {
    pub navigation: String,
    /// Identifier of the entity type the navigation leads to.
    pub target: String,
    pub query: ODataQuery,
}

/// Parse `$select`: `*` or a comma-separated list of declared property names.
///
/// # Errors
/// Returns `Error::Parser` for empty items or names the type does not declare.
pub fn parse_select(text: &str, entity_type: &EntityType) -> Result<Select, Error> {
    let mut names = Vec::new();
    for (position, item) in split_top_level(text, ',')? {
        match item {
            "*" => return Ok(Select::All),
            "" => return Err(ParserError::new(position, "empty $select item").into()),
            name if entity_type.property(name).is_some() => {
                if !names.iter().any(|n: &String| n == name) {
                    names.push(name.to_owned());
                }
            }
            name => {
                return Err(ParserError::new(
                    position,
                    format!("unknown property '{name}' on entity type '{}'", entity_type.identifier()),
                )
                .into());
            }
        }
    }
    Ok(Select::Properties(names))
}

/// Parse `$expand` items such as `flights($filter=duration gt 60;$top=5),country`.
///
/// # Errors
/// Returns `Error::Parser` for unknown or non-expandable navigation properties and
/// malformed option lists, or any error from the nested options.
pub fn parse_expand(
    text: &str,
    model: &Model,
    entity_type: &EntityType,
    limits: &ODataLimits,
    depth: usize,
) -> Result<Vec<ExpandItem>, Error> {
    let mut items = Vec::new();
    for (position, item) in split_top_level(text, ',')? {
        let (name, options) = match item.find('(') {
            Some(open) if item.ends_with(')') => (
                item[..open].trim_end(),
                Some((position + open + 1, &item[open + 1..item.len() - 1])),
            ),
            Some(open) => {
                return Err(ParserError::new(position + open, "unbalanced '(' in $expand").into());
            }
            None => (item, None),
        };
        if name.is_empty() {
            return Err(ParserError::new(position, "empty $expand item").into());
        }
        let navigation = entity_type.navigation_property(name).ok_or_else(|| {
            ParserError::new(
                position,
                format!("unknown navigation property '{name}' on '{}'", entity_type.identifier()),
            )
        })?;
        if !navigation.is_expandable() {
            return Err(ParserError::new(position, format!("navigation property '{name}' is not expandable")).into());
        }
        let target = navigation.target_type(model).ok_or_else(|| {
            ParserError::new(position, format!("navigation property '{name}' has no target type"))
        })?;

        let pairs = match options {
            Some((offset, options)) => nested_options(options, offset)?,
            None => Vec::new(),
        };
        let query = ODataQuery::parse_at_depth(model, target, pairs, limits, depth)?;
        items.push(ExpandItem {
            navigation: name.to_owned(),
            target: target.identifier().to_owned(),
            query,
        });
    }
    Ok(items)
}

fn nested_options(text: &str, offset: usize) -> Result<Vec<(&str, &str)>, ParserError> {
    split_top_level(text, ';')?
        .into_iter()
        .map(|(position, option)| {
            option
                .split_once('=')
                .map(|(key, value)| (key.trim(), value.trim()))
                .ok_or_else(|| ParserError::new(offset + position, format!("expected key=value, found '{option}'")))
        })
        .collect()
}

/// Split on `separator` outside parentheses and quotes, returning trimmed items with
/// their byte offsets.
fn split_top_level(text: &str, separator: char) -> Result<Vec<(usize, &str)>, ParserError> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| ParserError::new(i, "unbalanced ')' without matching '('"))?;
            }
            (None, c) if c == separator && depth == 0 => {
                items.push(trimmed_item(text, start, i));
                start = i + c.len_utf8();
            }
            (None, _) => {}
        }
    }
    if quote.is_some() || depth > 0 {
        return Err(ParserError::new(start, "unterminated group or quote"));
    }
    items.push(trimmed_item(text, start, text.len()));
    Ok(items)
}

fn trimmed_item(text: &str, from: usize, to: usize) -> (usize, &str) {
    let raw = &text[from..to];
    let trimmed = raw.trim_start();
    (from + raw.len() - trimmed.len(), trimmed.trim_end())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn split_respects_parens_and_quotes() {
        let items = split_top_level("a($filter=x eq 'p,q'), b , c(d(e))", ',').unwrap();
        let texts: Vec<_> = items.iter().map(|(_, t)| *t).collect();
        assert_eq!(texts, vec!["a($filter=x eq 'p,q')", "b", "c(d(e))"]);
        assert_eq!(items[1].0, 23);
    }

    #[test]
    fn split_doubled_quotes_stay_balanced() {
        let items = split_top_level("$filter=x eq 'it''s;ok';$top=1", ';').unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].1, "$top=1");
    }

    #[test]
    fn split_rejects_unbalanced() {
        assert!(split_top_level("a(b", ',').is_err());
        assert!(split_top_level("a)b", ',').is_err());
        assert!(split_top_level("a eq 'b", ',').is_err());
    }

    #[test]
    fn nested_options_need_equals() {
        let pairs = nested_options("$top=1;$skip = 2", 0).unwrap();
        assert_eq!(pairs, vec![("$top", "1"), ("$skip", "2")]);
        assert!(nested_options("$top", 0).is_err());
    }
}
