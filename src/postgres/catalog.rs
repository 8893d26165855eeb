use crate::types::ObjectType;

const USER_SCHEMAS: &str = "table_schema NOT IN ('information_schema','pg_catalog')";
const USER_ROUTINE_SCHEMAS: &str = "routine_schema NOT IN ('information_schema','pg_catalog')";

/// Catalog query listing objects of `kind` as `schema.name` (databases by name).
#[must_use]
pub fn object_list_sql(kind: ObjectType) -> String {
    match kind {
        ObjectType::Tables => format!(
            "SELECT table_schema || '.' || table_name FROM information_schema.tables \
             WHERE {USER_SCHEMAS} AND table_type = 'BASE TABLE'"
        ),
        ObjectType::Views => format!(
            "SELECT table_schema || '.' || table_name FROM information_schema.tables \
             WHERE {USER_SCHEMAS} AND table_type = 'VIEW'"
        ),
        ObjectType::Functions => format!(
            "SELECT DISTINCT routine_schema || '.' || routine_name FROM information_schema.routines \
             WHERE {USER_ROUTINE_SCHEMAS} AND routine_type = 'FUNCTION'"
        ),
        ObjectType::Procedures => format!(
            "SELECT DISTINCT routine_schema || '.' || routine_name FROM information_schema.routines \
             WHERE {USER_ROUTINE_SCHEMAS} AND routine_type = 'PROCEDURE'"
        ),
        ObjectType::Databases => {
            "SELECT datname::text FROM pg_database WHERE NOT datistemplate".to_string()
        }
    }
}
