pub mod auth;
pub mod path;
pub mod resolve_actor;
pub mod response;
pub mod validated_json;

pub use auth::{jwt_auth_middleware, AuthUser};
pub use path::ApiPath;
pub use resolve_actor::resolve_actor_middleware;
pub use response::{ApiResponse, ApiResult};
pub use validated_json::ValidatedJson;
