pub mod fixture;
pub use fixture::FixtureMembershipSource;
pub mod membership;
pub use membership::{MembershipSource, WebhookMembershipSource};
