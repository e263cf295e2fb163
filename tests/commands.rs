use db_manager_lib::backend::{self, column::ColumnDefinition, column_type::DeclaredType};
use db_manager_lib::util::config::Config;
use db_manager_lib::util::error::Error;
use pretty_assertions::assert_eq;
use rusqlite::types::Value;

fn config(tmp: &tempfile::TempDir) -> Config {
    Config::new(tmp.path().join("databases"), tmp.path().join("exports"))
}

fn pair(name: &str, value: Value) -> (String, Value) {
    (String::from(name), value)
}

#[test]
fn database_lifecycle() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(&tmp);

    assert_eq!(backend::create_database(&config, "inventory").unwrap(), "Database 'inventory' created successfully.");
    assert_eq!(backend::get_database_list(&config).unwrap(), vec!["inventory"]);
    assert!(matches!(backend::create_database(&config, "inventory"), Err(Error::ValidationError(_))));

    assert_eq!(backend::delete_database(&config, "inventory").unwrap(), "Database 'inventory' deleted successfully.");
    assert!(backend::get_database_list(&config).unwrap().is_empty());
    assert!(matches!(backend::delete_database(&config, "inventory"), Err(Error::NotFoundError(_))));
}

#[test]
fn names_are_checked_before_any_sql_runs() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(&tmp);
    backend::create_database(&config, "shop").unwrap();

    for bad in ["", "1st", "has space", "drop\"; --", "sqlite_master"] {
        let result = backend::create_table(&config, "shop", bad, &[ColumnDefinition::new("id", DeclaredType::Integer)]);
        assert!(matches!(result, Err(Error::ValidationError(_))), "{bad:?}");
    }
    assert!(matches!(backend::create_database(&config, "../escape"), Err(Error::ValidationError(_))));

    let bad_column = [ColumnDefinition::new("x) ; DROP TABLE t; --", DeclaredType::Text)];
    assert!(matches!(backend::create_table(&config, "shop", "t", &bad_column), Err(Error::ValidationError(_))));

    let bad_value = [pair("a b", Value::Null)];
    assert!(matches!(backend::insert_row(&config, "shop", "t", &bad_value), Err(Error::ValidationError(_))));
    assert!(backend::get_table_list(&config, "shop").unwrap().is_empty());
}

#[test]
fn missing_targets_are_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(&tmp);
    assert!(matches!(backend::get_table_list(&config, "nothing"), Err(Error::NotFoundError(_))));

    backend::create_database(&config, "shop").unwrap();
    assert!(matches!(backend::delete_table(&config, "shop", "nothing"), Err(Error::NotFoundError(_))));
    assert!(matches!(backend::get_table_columns(&config, "shop", "nothing"), Err(Error::NotFoundError(_))));
    assert!(matches!(backend::get_table_data(&config, "shop", "nothing"), Err(Error::NotFoundError(_))));
}

#[test]
fn table_and_row_commands() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(&tmp);
    backend::create_database(&config, "shop").unwrap();

    let message = backend::create_table(&config, "shop", "products", &[
        ColumnDefinition::new("id", DeclaredType::Integer).primary_key().autoincrement(),
        ColumnDefinition::new("sku", DeclaredType::Text).not_null().unique(),
        ColumnDefinition::new("price", DeclaredType::Real),
    ]).unwrap();
    assert_eq!(message, "Table 'products' created successfully.");

    backend::create_table(&config, "shop", "sales", &[
        ColumnDefinition::new("id", DeclaredType::Integer).primary_key(),
        ColumnDefinition::new("sku", DeclaredType::Text).references("products", "sku"),
    ]).unwrap();
    assert_eq!(backend::get_table_list(&config, "shop").unwrap(), vec!["products", "sales"]);

    backend::insert_row(&config, "shop", "products", &[pair("sku", Value::Text(String::from("A-1"))), pair("price", Value::Real(2.5))]).unwrap();
    backend::insert_row(&config, "shop", "products", &[pair("sku", Value::Text(String::from("B-2")))]).unwrap();
    assert_eq!(
        backend::get_parent_values(&config, "shop", "products", "sku").unwrap(),
        vec![Value::Text(String::from("A-1")), Value::Text(String::from("B-2"))]
    );

    backend::update_row(&config, "shop", "products", &[pair("id", Value::Integer(2))], &[pair("price", Value::Real(4.0))]).unwrap();
    let rows = backend::get_table_data(&config, "shop", "products").unwrap().rows;
    assert_eq!(rows[1], vec![Value::Integer(2), Value::Text(String::from("B-2")), Value::Real(4.0)]);

    backend::delete_row(&config, "shop", "products", &[pair("id", Value::Integer(2))]).unwrap();
    let gone = backend::delete_row(&config, "shop", "products", &[pair("id", Value::Integer(2))]);
    assert!(matches!(gone, Err(Error::NotFoundError(m)) if m == "Row not found. It may have been deleted by another user."));

    let message = backend::add_column(&config, "shop", "products", &ColumnDefinition::new("note", DeclaredType::Text)).unwrap();
    assert_eq!(message, "Column 'note' added to 'products'.");
    assert_eq!(backend::get_table_columns(&config, "shop", "products").unwrap().len(), 4);

    let message = backend::remove_column(&config, "shop", "products", "note").unwrap();
    assert_eq!(message, "Column 'note' removed successfully.");
    assert!(matches!(
        backend::remove_column(&config, "shop", "products", "sku"),
        Err(Error::ValidationError(m)) if m.contains("'sales'")
    ));

    assert_eq!(backend::delete_table(&config, "shop", "sales").unwrap(), "Table 'sales' deleted successfully.");
}

#[test]
fn exports_default_to_the_export_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(&tmp);
    backend::create_database(&config, "shop").unwrap();
    backend::create_table(&config, "shop", "items", &[
        ColumnDefinition::new("id", DeclaredType::Integer).primary_key(),
        ColumnDefinition::new("name", DeclaredType::Text),
    ]).unwrap();
    backend::insert_row(&config, "shop", "items", &[pair("name", Value::Text(String::from("pen")))]).unwrap();

    backend::export_database(&config, "shop", None).unwrap();
    let dump = std::fs::read_to_string(config.export_dir.join("shop_dump.sql")).unwrap();
    assert!(dump.contains("INSERT INTO \"items\" VALUES(1,'pen');"));

    let message = backend::export_table_csv(&config, "shop", "items", None).unwrap();
    assert!(message.starts_with("Exported 1 row(s)"));
    let csv_path = config.export_dir.join("shop_items.csv");
    assert_eq!(std::fs::read_to_string(&csv_path).unwrap(), "id,name\n1,pen\n");

    backend::create_table(&config, "shop", "copy", &[
        ColumnDefinition::new("id", DeclaredType::Integer).primary_key(),
        ColumnDefinition::new("name", DeclaredType::Text),
    ]).unwrap();
    assert_eq!(backend::import_table_csv(&config, "shop", "copy", &csv_path).unwrap(), "Imported 1 row(s) into 'copy'.");
    assert_eq!(
        backend::get_table_data(&config, "shop", "copy").unwrap().rows,
        backend::get_table_data(&config, "shop", "items").unwrap().rows
    );
}
