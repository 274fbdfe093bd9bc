//! Row level security statements

use std::fmt;

/// The SQL command an RLS policy restricts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RlsCommand {
    Select,
    Insert,
    Update,
    Delete,
}

impl fmt::Display for RlsCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RlsCommand::Select => write!(f, "SELECT"),
            RlsCommand::Insert => write!(f, "INSERT"),
            RlsCommand::Update => write!(f, "UPDATE"),
            RlsCommand::Delete => write!(f, "DELETE"),
        }
    }
}

/// A policy for signed-in users on a table in the `public` schema.
///
/// `using` decides which existing rows are visible or modifiable; `check`
/// validates rows being written. Postgres rejects `USING` on insert policies,
/// so only `check` is rendered for [`RlsCommand::Insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RlsPolicy {
    pub name: String,
    pub table: &'static str,
    pub command: RlsCommand,
    pub using: Option<String>,
    pub check: Option<String>,
}

impl RlsPolicy {
    /// Policy limiting `command` to rows whose `column` is the caller
    pub fn owner(table: &'static str, command: RlsCommand, column: &str, name: &str) -> Self {
        let expr = format!("auth.uid() = {}", column);
        let (using, check) = match command {
            RlsCommand::Insert => (None, Some(expr)),
            RlsCommand::Update => (Some(expr.clone()), Some(expr)),
            RlsCommand::Select | RlsCommand::Delete => (Some(expr), None),
        };
        Self {
            name: name.to_string(),
            table,
            command,
            using,
            check,
        }
    }

    /// Require `condition` as well for rows being written
    pub fn and_check(mut self, condition: &str) -> Self {
        self.check = Some(match self.check {
            Some(check) => format!("{} AND {}", check, condition),
            None => condition.to_string(),
        });
        self
    }

    pub fn create_policy_sql(&self) -> String {
        let using = match (&self.using, self.command) {
            (Some(expr), command) if command != RlsCommand::Insert => {
                format!(" USING ({})", expr)
            }
            _ => String::new(),
        };
        let check = self
            .check
            .as_ref()
            .map_or(String::new(), |c| format!(" WITH CHECK ({})", c));
        format!(
            "CREATE POLICY \"{name}\" ON public.{table} FOR {command} TO authenticated{using}{check};",
            name = self.name,
            table = self.table,
            command = self.command,
        )
    }

    pub fn drop_policy_sql(&self) -> String {
        format!(
            "DROP POLICY IF EXISTS \"{}\" ON public.{};",
            self.name, self.table
        )
    }
}

pub fn enable_rls_sql(table: &str) -> String {
    format!("ALTER TABLE public.{} ENABLE ROW LEVEL SECURITY;", table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_policy_has_only_check() {
        let policy = RlsPolicy::owner("classes", RlsCommand::Insert, "teacher_id", "insert own");
        assert_eq!(
            policy.create_policy_sql(),
            "CREATE POLICY \"insert own\" ON public.classes FOR INSERT TO authenticated \
             WITH CHECK (auth.uid() = teacher_id);"
        );
    }

    #[test]
    fn update_policy_has_both_clauses() {
        let sql = RlsPolicy::owner("profiles", RlsCommand::Update, "user_id", "update own")
            .create_policy_sql();
        assert!(sql.contains("USING (auth.uid() = user_id)"));
        assert!(sql.contains("WITH CHECK (auth.uid() = user_id)"));
    }

    #[test]
    fn extra_check_is_joined_to_owner_check() {
        let sql = RlsPolicy::owner("assignments", RlsCommand::Update, "teacher_id", "update own")
            .and_check("turma_id IS NOT NULL")
            .create_policy_sql();
        assert!(sql.contains(" USING (auth.uid() = teacher_id) "));
        assert!(sql.ends_with("WITH CHECK (auth.uid() = teacher_id AND turma_id IS NOT NULL);"));
    }

    #[test]
    fn drop_is_idempotent() {
        let policy = RlsPolicy::owner("classes", RlsCommand::Delete, "teacher_id", "delete own");
        assert_eq!(
            policy.drop_policy_sql(),
            "DROP POLICY IF EXISTS \"delete own\" ON public.classes;"
        );
    }
}
