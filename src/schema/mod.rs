//! Database schema: tables, triggers and row policies, rendered as SQL for
//! the hosted Postgres.

mod rls;

pub use rls::{enable_rls_sql, RlsCommand, RlsPolicy};

use crate::models::{ASSIGNMENTS, CLASSES, PROFILES};

const TABLES: &str = r#"CREATE TABLE public.profiles (
    id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
    user_id uuid NOT NULL UNIQUE REFERENCES auth.users (id) ON DELETE CASCADE,
    full_name text NOT NULL,
    school_name text,
    created_at timestamptz NOT NULL DEFAULT now(),
    updated_at timestamptz NOT NULL DEFAULT now()
);

CREATE TABLE public.classes (
    id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
    teacher_id uuid NOT NULL REFERENCES auth.users (id) ON DELETE CASCADE,
    name text NOT NULL,
    description text,
    grade_level text,
    subject text,
    created_at timestamptz NOT NULL DEFAULT now(),
    updated_at timestamptz NOT NULL DEFAULT now()
);

CREATE TABLE public.assignments (
    id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
    turma_id uuid NOT NULL REFERENCES public.classes (id) ON DELETE CASCADE,
    teacher_id uuid NOT NULL REFERENCES auth.users (id) ON DELETE CASCADE,
    title text NOT NULL,
    description text,
    due_date date,
    status text NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'in_progress', 'completed')),
    created_at timestamptz NOT NULL DEFAULT now(),
    updated_at timestamptz NOT NULL DEFAULT now()
);"#;

const UPDATED_AT_FUNCTION: &str = r#"CREATE OR REPLACE FUNCTION public.update_updated_at_column()
RETURNS trigger
LANGUAGE plpgsql
AS $$
BEGIN
    NEW.updated_at = now();
    RETURN NEW;
END;
$$;"#;

const NEW_USER_FUNCTION: &str = r#"CREATE OR REPLACE FUNCTION public.handle_new_user()
RETURNS trigger
LANGUAGE plpgsql
SECURITY DEFINER
SET search_path = public
AS $$
BEGIN
    INSERT INTO public.profiles (user_id, full_name)
    VALUES (NEW.id, COALESCE(NEW.raw_user_meta_data ->> 'full_name', ''));
    RETURN NEW;
END;
$$;

CREATE TRIGGER on_auth_user_created
    AFTER INSERT ON auth.users
    FOR EACH ROW EXECUTE FUNCTION public.handle_new_user();"#;

/// Foreign keys are checked without row policies, so writes to assignments
/// must also prove the class belongs to the caller.
const OWN_CLASS: &str = "EXISTS (SELECT 1 FROM public.classes c \
                         WHERE c.id = turma_id AND c.teacher_id = auth.uid())";

fn updated_at_trigger(table: &str) -> String {
    format!(
        "CREATE TRIGGER update_{table}_updated_at\n    BEFORE UPDATE ON public.{table}\n    \
         FOR EACH ROW EXECUTE FUNCTION public.update_updated_at_column();"
    )
}

/// Owner policies for every table. Profiles cannot be deleted by their
/// owner; they go away with the identity.
pub fn policies() -> Vec<RlsPolicy> {
    let mut policies = vec![
        RlsPolicy::owner(PROFILES, RlsCommand::Select, "user_id", "Users can view their own profile"),
        RlsPolicy::owner(PROFILES, RlsCommand::Insert, "user_id", "Users can insert their own profile"),
        RlsPolicy::owner(PROFILES, RlsCommand::Update, "user_id", "Users can update their own profile"),
    ];
    for (table, noun) in [(CLASSES, "classes"), (ASSIGNMENTS, "assignments")] {
        for (command, verb) in [
            (RlsCommand::Select, "view"),
            (RlsCommand::Insert, "create"),
            (RlsCommand::Update, "update"),
            (RlsCommand::Delete, "delete"),
        ] {
            let name = format!("Teachers can {} their own {}", verb, noun);
            let mut policy = RlsPolicy::owner(table, command, "teacher_id", &name);
            if table == ASSIGNMENTS && matches!(command, RlsCommand::Insert | RlsCommand::Update) {
                policy = policy.and_check(OWN_CLASS);
            }
            policies.push(policy);
        }
    }
    policies
}

/// Full forward migration
pub fn migration_sql() -> String {
    let tables = [PROFILES, CLASSES, ASSIGNMENTS];
    let mut parts = vec![TABLES.to_string()];
    parts.extend(tables.iter().map(|t| enable_rls_sql(t)));
    parts.extend(policies().iter().map(RlsPolicy::create_policy_sql));
    parts.push(UPDATED_AT_FUNCTION.to_string());
    parts.extend(tables.iter().map(|t| updated_at_trigger(t)));
    parts.push(NEW_USER_FUNCTION.to_string());
    parts.join("\n\n") + "\n"
}

/// Reverse of [`migration_sql`]
pub fn drop_sql() -> String {
    let mut parts = vec![
        "DROP TRIGGER IF EXISTS on_auth_user_created ON auth.users;".to_string(),
        "DROP FUNCTION IF EXISTS public.handle_new_user();".to_string(),
    ];
    parts.extend(policies().iter().map(RlsPolicy::drop_policy_sql));
    for table in [ASSIGNMENTS, CLASSES, PROFILES] {
        parts.push(format!("DROP TABLE IF EXISTS public.{};", table));
    }
    parts.push("DROP FUNCTION IF EXISTS public.update_updated_at_column();".to_string());
    parts.join("\n") + "\n"
}
