use std::fmt;

use crate::directory::models::ListQuery;

/// One `attr eq "value"` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub attribute: String,
    pub value: String,
}

/// Conjunction of equality clauses, rendered in SCIM filter syntax:
/// `a eq "x" and b eq "y"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn eq(attribute: &str, value: &str) -> Self {
        Self::default().and_eq(attribute, value)
    }

    pub fn and_eq(mut self, attribute: &str, value: &str) -> Self {
        self.clauses.push(Clause {
            attribute: attribute.to_owned(),
            value: value.to_owned(),
        });
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn into_query(self) -> ListQuery {
        ListQuery {
            filter: Some(self.to_string()),
            ..ListQuery::default()
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(" and ")?;
            }
            write!(f, "{} eq \"{}\"", clause.attribute, escape(&clause.value))?;
        }
        Ok(())
    }
}

// values land inside a quoted string literal
fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
