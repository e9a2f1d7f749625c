//! Request middleware guarding the protected `/api` scope.

mod jwt_middleware;

pub use jwt_middleware::JwtMiddleware;
