//! Cooperative cancellation.
//!
//! Each scheduled task owns one [`CancellationToken`]. The scheduler checks it
//! before starting the task body, and long-running bodies (network fetch,
//! geolocation) race their work against [`CancellationToken::cancelled`].

mod token;

pub use token::CancellationToken;
