//! Parser for bracketed option lists inside parameter strings.
//!
//! A parameter such as `a [red,blue] car at [dawn,dusk]` is parsed into a
//! sequence of literal and variation segments, then expanded by an explicit
//! Cartesian product. Blocks are substituted left to right and the leftmost
//! block varies slowest.

use crate::error::VariationError;

/// One parsed piece of a parameter string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text copied verbatim into every expansion.
    Literal(String),
    /// A bracketed block; exactly one option is chosen per expansion.
    Variation(Vec<String>),
}

/// One concrete value produced by expanding a [`ParamString`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    /// The parameter text with every block replaced by its chosen option.
    pub text: String,
    /// The chosen option for each block, in block order.
    pub choices: Vec<String>,
}

/// A parameter string parsed into literal and variation segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamString {
    source: String,
    segments: Vec<Segment>,
}

impl ParamString {
    /// Parses `input`, naming it `parameter` in any error.
    ///
    /// An opening bracket with no closing bracket after it is kept as
    /// literal text. Options are trimmed and blank options are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`VariationError::EmptyVariationAxis`] for a block with no
    /// non-blank option, such as `[]` or `[ , ]`.
    pub fn parse(parameter: &str, input: &str) -> Result<Self, VariationError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = input;
        let mut offset = 0;

        while let Some(open) = rest.find('[') {
            let after_open = &rest[open + 1..];
            let Some(close) = after_open.find(']') else {
                break;
            };

            literal.push_str(&rest[..open]);

            let options: Vec<String> = after_open[..close]
                .split(',')
                .map(str::trim)
                .filter(|option| !option.is_empty())
                .map(String::from)
                .collect();

            if options.is_empty() {
                return Err(VariationError::EmptyVariationAxis {
                    parameter: parameter.to_string(),
                    position: offset + open,
                });
            }

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Variation(options));

            let consumed = open + close + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: input.to_string(),
            segments,
        })
    }

    /// The original, unparsed text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The parsed segments in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of bracketed blocks.
    pub fn block_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|segment| matches!(segment, Segment::Variation(_)))
            .count()
    }

    /// Whether the string contains at least one bracketed block.
    pub fn has_variations(&self) -> bool {
        self.block_count() > 0
    }

    /// Number of expansions [`ParamString::expand`] will produce.
    pub fn combination_count(&self) -> usize {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(_) => 1,
                Segment::Variation(options) => options.len(),
            })
            .product()
    }

    /// Expands every combination of options, leftmost block outermost.
    pub fn expand(&self) -> Vec<Expansion> {
        let mut expansions = vec![Expansion::default()];

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => {
                    for expansion in &mut expansions {
                        expansion.text.push_str(text);
                    }
                }
                Segment::Variation(options) => {
                    expansions = expansions
                        .into_iter()
                        .flat_map(|prefix| {
                            options.iter().map(move |option| {
                                let mut next = prefix.clone();
                                next.text.push_str(option);
                                next.choices.push(option.clone());
                                next
                            })
                        })
                        .collect();
                }
            }
        }

        expansions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(param: &ParamString) -> Vec<String> {
        param.expand().into_iter().map(|e| e.text).collect()
    }

    #[test]
    fn test_plain_text_is_single_expansion() {
        let param = ParamString::parse("prompt", "a quiet harbor").expect("should parse");
        assert!(!param.has_variations());
        assert_eq!(param.combination_count(), 1);
        assert_eq!(texts(&param), vec!["a quiet harbor"]);
        assert!(param.expand()[0].choices.is_empty());
    }

    #[test]
    fn test_single_block_with_prefix_and_suffix() {
        let param = ParamString::parse("prompt", "a [cat, dog] sleeping").expect("should parse");
        assert_eq!(param.block_count(), 1);
        assert_eq!(texts(&param), vec!["a cat sleeping", "a dog sleeping"]);
        assert_eq!(param.expand()[1].choices, vec!["dog"]);
    }

    #[test]
    fn test_multiple_blocks_leftmost_outermost() {
        let param = ParamString::parse("prompt", "[red,blue] car at [dawn,dusk]").expect("should parse");
        assert_eq!(param.combination_count(), 4);
        assert_eq!(
            texts(&param),
            vec![
                "red car at dawn",
                "red car at dusk",
                "blue car at dawn",
                "blue car at dusk"
            ]
        );
        assert_eq!(param.expand()[2].choices, vec!["blue", "dawn"]);
    }

    #[test]
    fn test_empty_block_is_error() {
        let err = ParamString::parse("model", "image[]").expect_err("empty block should fail");
        assert_eq!(
            err,
            VariationError::EmptyVariationAxis {
                parameter: "model".to_string(),
                position: 5,
            }
        );

        assert!(ParamString::parse("prompt", "a [ , ] b").is_err());
    }

    #[test]
    fn test_empty_block_position_after_earlier_block() {
        let err = ParamString::parse("prompt", "[a,b] x []").expect_err("should fail");
        assert!(matches!(
            err,
            VariationError::EmptyVariationAxis { position: 8, .. }
        ));
    }

    #[test]
    fn test_unmatched_bracket_is_literal() {
        let param = ParamString::parse("prompt", "a [cat, dog").expect("should parse");
        assert!(!param.has_variations());
        assert_eq!(texts(&param), vec!["a [cat, dog"]);

        let param = ParamString::parse("prompt", "[x,y] then [open").expect("should parse");
        assert_eq!(texts(&param), vec!["x then [open", "y then [open"]);
    }

    #[test]
    fn test_stray_closing_bracket_is_literal() {
        let param = ParamString::parse("prompt", "a] b").expect("should parse");
        assert_eq!(texts(&param), vec!["a] b"]);
    }

    #[test]
    fn test_blank_options_are_dropped() {
        let param = ParamString::parse("prompt", "[a,,b,]").expect("should parse");
        assert_eq!(texts(&param), vec!["a", "b"]);
    }

    #[test]
    fn test_expansion_is_deterministic() {
        let param = ParamString::parse("prompt", "[a,b,c] [1,2]").expect("should parse");
        assert_eq!(param.expand(), param.expand());
        assert_eq!(param.expand().len(), param.combination_count());
    }

    #[test]
    fn test_empty_input() {
        let param = ParamString::parse("prompt", "").expect("should parse");
        assert_eq!(param.segments().len(), 0);
        assert_eq!(texts(&param), vec![""]);
        assert_eq!(param.source(), "");
    }
}
