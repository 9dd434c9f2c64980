pub mod account;
pub mod group;
pub mod principal;
pub mod resource;
pub mod service;
pub mod user;

pub use account::{
    Account, AccountFilter, AccountMember, AccountMemberResponse, AccountPatch, AccountUser,
};
pub use group::{
    Group, GroupFilter, GroupMembership, GroupRef, GroupUpdate, Member, MemberResponse,
    Membership, ADMINS_GROUP,
};
pub use principal::{
    service_session_key, session_key, user_session_key, Identity, Principal, SUPER_ADMIN_NAME,
};
pub use resource::{Resource, ResourcePatch, ResourceUsage, UsageFilter};
pub use service::{CreatedService, Service, ServiceSummary};
pub use user::{
    normalize_dom_name, SanitizedUser, User, UserGroupSummary, UserPatch, UserProfile,
    UserWithGroups,
};
