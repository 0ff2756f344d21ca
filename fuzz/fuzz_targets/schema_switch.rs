//! Fuzz target for schema switching.
//!
//! Whatever the name, switching issues a single statement and the session
//! ends up on exactly that name, never executing anything smuggled in it.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tenantry_core::SchemaExecutor;
use tenantry_testing::{MockCatalog, MockConnection};

#[derive(Debug, Arbitrary)]
struct FuzzSwitch {
    schema: String,
    create_first: bool,
}

fuzz_target!(|data: FuzzSwitch| {
    if data.schema.trim().is_empty() || data.schema.contains('\0') {
        return;
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().build() {
        Ok(runtime) => runtime,
        Err(_) => return,
    };

    runtime.block_on(async {
        let catalog = MockCatalog::new();
        let before = catalog.schemas();
        let mut exec = SchemaExecutor::new(MockConnection::new(&catalog));

        if data.create_first {
            exec.create_schema(&data.schema).await.unwrap();
            assert!(exec.schema_exists(&data.schema).await.unwrap());
        }

        exec.switch_schema(&data.schema).await.unwrap();
        assert_eq!(exec.connection().search_path(), Some(data.schema.as_str()));
        assert_eq!(exec.connection().search_path_history().len(), 1);

        if !data.create_first {
            assert_eq!(catalog.schemas(), before);
        }
    });
});
