//! HTTP control plane.
//!
//! Route table (auth requirement / rate-limit action):
//!
//! | Route | Auth | Action |
//! |---|---|---|
//! | `POST /api/login` | public | `login` |
//! | `POST /api/logout` | authed | — |
//! | `GET/POST /api/settings` | admin | `settings_get` / `settings_save` |
//! | `POST /api/session/request-code` | admin | `session_request_code` |
//! | `POST /api/session/complete` | admin | `session_complete` |
//! | `GET /api/telegram/chats` | admin | `chat_sync` |
//! | `POST /api/engine/test` | admin | `engine_test` |
//! | `POST /api/start`, `POST /api/stop` | admin | `engine_control` |
//! | `GET /api/status` | authed | `status` |
//! | `GET /api/messages` | authed | `messages` |
//! | `GET /api/stats` | authed | `stats` |
//! | `GET /api/health` | public | — |

pub mod auth;
pub mod error;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use server::{DEFAULT_PORT, build_router, port_from_env, serve};
