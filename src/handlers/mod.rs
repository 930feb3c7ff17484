// handlers/mod.rs - HTTP handlers, one module per resource.
//
// Routing and middleware wiring live in app.rs.
pub mod places;
