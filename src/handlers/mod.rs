// handlers/mod.rs - One module per resource, each exposing its own Router
//
// Auth endpoints split into public (register, token) and protected (whoami)
// routers so the app can layer JWT middleware on the protected half only.
pub mod attributes;
pub mod auth;
pub mod ingredients;
pub mod recipes;
pub mod tags;
