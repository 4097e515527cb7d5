//! The TinyLink tables.

use crate::error::Result;
use crate::schema::{
    ColumnDefinition, ColumnType, ConstraintDefinition, DefaultValue, Schema, TableDefinition,
};

/// Registered users.
#[must_use]
pub fn users() -> TableDefinition {
    TableDefinition::new("users")
        .column(ColumnDefinition::new("id", ColumnType::Serial).primary_key())
        .column(
            ColumnDefinition::new("email", ColumnType::Varchar)
                .char_limit(255)
                .unique()
                .not_null(),
        )
        .column(
            ColumnDefinition::new("password_hash", ColumnType::Varchar)
                .char_limit(255)
                .not_null(),
        )
        .column(ColumnDefinition::new("name", ColumnType::Varchar).char_limit(100))
        .column(timestamp("created_at"))
        .column(timestamp("updated_at"))
        .constraint(ConstraintDefinition::unique(&["email"]))
        .index(&["email"])
        .index(&["created_at"])
}

/// Short links owned by users.
#[must_use]
pub fn links() -> TableDefinition {
    TableDefinition::new("links")
        .column(ColumnDefinition::new("id", ColumnType::Serial).primary_key())
        .column(ColumnDefinition::new("user_id", ColumnType::Integer).not_null())
        .column(
            ColumnDefinition::new("short_code", ColumnType::Varchar)
                .char_limit(8)
                .unique()
                .not_null(),
        )
        .column(ColumnDefinition::new("target_url", ColumnType::Text).not_null())
        .column(
            ColumnDefinition::new("total_clicks", ColumnType::Integer)
                .not_null()
                .default(DefaultValue::literal(0)),
        )
        .column(ColumnDefinition::new("last_clicked_at", ColumnType::Timestamp))
        .column(timestamp("created_at"))
        .column(timestamp("updated_at"))
        .constraint(ConstraintDefinition::reference_to(
            "user_id", "users", "id", true,
        ))
        .constraint(ConstraintDefinition::check(
            "short_code ~ '^[A-Za-z0-9]{6,8}$'",
        ))
        .constraint(ConstraintDefinition::check("total_clicks >= 0"))
        .index(&["short_code"])
        .index(&["user_id"])
        .index(&["created_at"])
        .index(&["user_id", "created_at"])
}

/// One row per redirect served.
#[must_use]
pub fn clicks() -> TableDefinition {
    TableDefinition::new("clicks")
        .column(ColumnDefinition::new("id", ColumnType::Serial).primary_key())
        .column(ColumnDefinition::new("link_id", ColumnType::Integer).not_null())
        .column(ColumnDefinition::new("ip_address", ColumnType::Inet).not_null())
        .column(ColumnDefinition::new("user_agent", ColumnType::Text).not_null())
        .column(ColumnDefinition::new("browser", ColumnType::Varchar).char_limit(50))
        .column(ColumnDefinition::new("os", ColumnType::Varchar).char_limit(50))
        .column(ColumnDefinition::new("device", ColumnType::Varchar).char_limit(50))
        .column(ColumnDefinition::new("country", ColumnType::Varchar).char_limit(100))
        .column(ColumnDefinition::new("city", ColumnType::Varchar).char_limit(100))
        .column(ColumnDefinition::new("referer", ColumnType::Text))
        .column(timestamp("clicked_at"))
        .constraint(ConstraintDefinition::reference_to(
            "link_id", "links", "id", true,
        ))
        .index(&["link_id"])
        .index(&["clicked_at"])
        .index(&["link_id", "clicked_at"])
        .index(&["ip_address"])
        .index(&["browser"])
        .index(&["os"])
        .index(&["device"])
        .index(&["country"])
}

fn timestamp(name: &str) -> ColumnDefinition {
    ColumnDefinition::new(name, ColumnType::Timestamp)
        .not_null()
        .default(DefaultValue::Now)
}

/// Returns the TinyLink schema.
///
/// # Errors
///
/// Never fails in practice; the tables are validated like any other schema.
pub fn schema() -> Result<Schema> {
    Schema::new(vec![users(), links(), clicks()])
}
