pub mod http_identity;
