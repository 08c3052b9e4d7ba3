// Query-string filters for the recipe list endpoint.
//
// `tags` and `ingredients` arrive as comma-separated id lists. Each filter
// independently narrows the owner's recipes to those referencing at least
// one of the given ids; both present compose with AND.

/// Raised when a filter parameter is not a comma-separated integer list.
/// `field` names the offending query parameter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct FilterError {
    pub field: &'static str,
    pub message: String,
}

impl FilterError {
    fn bad_id_list(field: &'static str) -> Self {
        FilterError {
            field,
            message: "value must be a comma-separated list of integers".to_string(),
        }
    }
}

/// Constraints applied to a recipe list on top of the ownership scope.
/// Empty vectors mean "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub tags: Vec<i64>,
    pub ingredients: Vec<i64>,
}

impl RecipeFilter {
    /// Builds a filter from the raw query parameters. Absent or empty
    /// parameters apply no constraint.
    pub fn from_params(
        tags: Option<&str>,
        ingredients: Option<&str>,
    ) -> Result<Self, FilterError> {
        Ok(RecipeFilter {
            tags: parse_id_list("tags", tags)?,
            ingredients: parse_id_list("ingredients", ingredients)?,
        })
    }
}

fn parse_id_list(field: &'static str, raw: Option<&str>) -> Result<Vec<i64>, FilterError> {
    let raw = match raw {
        Some(s) if !s.trim().is_empty() => s,
        _ => return Ok(Vec::new()),
    };

    raw.split(',')
        .map(|segment| {
            segment
                .trim()
                .parse::<i64>()
                .map_err(|_| FilterError::bad_id_list(field))
        })
        .collect()
}
