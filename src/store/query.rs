//! Query description shared by every store implementation

use super::filter::Filter;

/// Sort direction on a single column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: true,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: false,
        }
    }

    fn to_param(&self) -> String {
        let direction = if self.ascending { "asc" } else { "desc" };
        format!("{}.{}", self.column, direction)
    }
}

/// A select over one collection: columns (with optional embedded parents),
/// filter and order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub select: String,
    pub filter: Filter,
    pub order: Option<Order>,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            select: "*".to_string(),
            filter: Filter::new(),
            order: None,
        }
    }
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns to select, e.g. `*,classes(name)`
    pub fn select(mut self, columns: &str) -> Self {
        self.select = columns.to_string();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn eq<T: ToString>(mut self, column: &str, value: T) -> Self {
        self.filter = self.filter.eq(column, value);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    /// Embedded relations named in the select list: `*,classes(name)` yields
    /// `[("classes", ["name"])]`.
    pub fn embeds(&self) -> Vec<(String, Vec<String>)> {
        let mut embeds = Vec::new();
        let mut rest = self.select.as_str();
        while let Some(open) = rest.find('(') {
            let Some(close) = rest[open..].find(')') else {
                break;
            };
            let name = rest[..open]
                .rsplit(',')
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();
            let columns = rest[open + 1..open + close]
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
            embeds.push((name, columns));
            rest = &rest[open + close + 1..];
        }
        embeds
    }

    /// PostgREST query pairs
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.select.clone())];
        params.extend(self.filter.to_params());
        if let Some(order) = &self.order {
            params.push(("order".to_string(), order.to_param()));
        }
        params
    }
}
