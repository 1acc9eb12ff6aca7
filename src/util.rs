use std::net::{Ipv4Addr, SocketAddr};

pub const RESEND_API_KEY: &str = "RESEND_API_KEY";
pub const RESEND_FROM: &str = "RESEND_FROM";
pub const TWILIO_ACCOUNT_SID: &str = "TWILIO_ACCOUNT_SID";
pub const TWILIO_AUTH_TOKEN: &str = "TWILIO_AUTH_TOKEN";
pub const TWILIO_FROM_NUMBER: &str = "TWILIO_FROM_NUMBER";
pub const PUSH_GATEWAY_URL: &str = "PUSH_GATEWAY_URL";
pub const PUSH_GATEWAY_TOKEN: &str = "PUSH_GATEWAY_TOKEN";
pub const VAPID_PUBLIC_KEY: &str = "VAPID_PUBLIC_KEY";
pub const API_TOKEN: &str = "CITYWATCH_API_TOKEN";

const DEFAULT_PORT: u16 = 8080;

const DEFAULT_ADDR: Ipv4Addr = Ipv4Addr::new(127, 0, 0, 1);

pub fn get_default_bind() -> SocketAddr {
    SocketAddr::from((DEFAULT_ADDR, DEFAULT_PORT))
}

/// Read a secret from the environment; blank values count as unset.
pub fn get_secret(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
