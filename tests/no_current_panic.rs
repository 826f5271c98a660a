use sqlbridge::registry;

// Separate test binary, so the global registry is guaranteed untouched.
#[test]
#[should_panic(expected = "database registry is not initialized")]
fn current_panics_before_any_database_is_registered() {
    let _ = registry::current();
}
