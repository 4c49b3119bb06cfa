//! Résumé storage service: session credentials with a bounded per-user
//! session ledger, and CV documents served from a Redis-style cache with a
//! concurrent ownership-filtering fan-out.

pub mod config;
pub mod error;
pub mod state;
pub mod db;
pub mod routes;

pub mod crypto {
    pub mod password;
    pub mod token;
}

pub mod models {
    pub mod cv;
    pub mod session;
    pub mod user;
}

pub mod repositories {
    pub mod profile;
    pub mod session;
    pub mod user;
}

pub mod cache {
    pub mod local;
    pub mod ownership;
}

pub mod services {
    pub mod auth;
    pub mod fetcher;
    pub mod profiles;
}

pub mod handlers {
    pub mod auth;
    pub mod cvs;
}

pub mod middleware_layer {
    pub mod auth;
}

pub mod validation {
    pub mod auth;
}
