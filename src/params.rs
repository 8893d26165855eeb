use crate::error::{QueryStateError, SqlBridgeError};
use crate::types::Variant;

/// A named value bound to one or more `:name` occurrences.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryParameter {
    name: String,
    value: Variant,
    bind_positions: Vec<u32>,
    is_output: bool,
}

impl QueryParameter {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn value(&self) -> &Variant {
        &self.value
    }

    pub fn set_value(&mut self, value: impl Into<Variant>) {
        self.value = value.into();
    }

    pub fn set_null(&mut self) {
        self.value = Variant::Null;
    }

    /// 1-based bind positions this parameter occupies.
    #[must_use]
    pub fn bind_positions(&self) -> &[u32] {
        &self.bind_positions
    }

    pub fn bind_add(&mut self, position: u32) {
        self.bind_positions.push(position);
    }

    pub fn bind_clear(&mut self) {
        self.bind_positions.clear();
    }

    #[must_use]
    pub fn is_output(&self) -> bool {
        self.is_output
    }

    pub fn set_output(&mut self, is_output: bool) {
        self.is_output = is_output;
    }
}

/// Query parameters, ordered by first occurrence in the SQL text.
#[derive(Debug, Clone, Default)]
pub struct ParameterList {
    items: Vec<QueryParameter>,
}

impl ParameterList {
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryParameter> {
        self.items.iter()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&QueryParameter> {
        self.items.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut QueryParameter> {
        self.items
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// # Errors
    /// Returns `QueryStateError::UnknownParameter` if the SQL has no such placeholder.
    pub fn param_mut(&mut self, name: &str) -> Result<&mut QueryParameter, SqlBridgeError> {
        self.get_mut(name)
            .ok_or_else(|| QueryStateError::UnknownParameter(name.to_string()).into())
    }

    #[must_use]
    pub fn by_index(&self, index: usize) -> Option<&QueryParameter> {
        self.items.get(index)
    }

    pub fn by_index_mut(&mut self, index: usize) -> Option<&mut QueryParameter> {
        self.items.get_mut(index)
    }

    /// Re-derive bind positions from the placeholder names of a new SQL text.
    ///
    /// Parameters whose name still occurs keep their value; the rest are dropped.
    pub fn rebind(&mut self, occurrences: &[String]) {
        for param in &mut self.items {
            param.bind_clear();
        }
        for (i, name) in occurrences.iter().enumerate() {
            let position = u32::try_from(i + 1).unwrap_or(u32::MAX);
            match self.get_mut(name) {
                Some(param) => param.bind_add(position),
                None => {
                    let mut param = QueryParameter::new(name);
                    param.bind_add(position);
                    self.items.push(param);
                }
            }
        }
        self.items.retain(|p| !p.bind_positions.is_empty());
    }

    /// Every bind position with its parameter, in ascending position order.
    #[must_use]
    pub fn bind_slots(&self) -> Vec<(u32, &QueryParameter)> {
        let mut slots: Vec<(u32, &QueryParameter)> = self
            .items
            .iter()
            .flat_map(|p| p.bind_positions.iter().map(move |pos| (*pos, p)))
            .collect();
        slots.sort_by_key(|(pos, _)| *pos);
        slots
    }
}
