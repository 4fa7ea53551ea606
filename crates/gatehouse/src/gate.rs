//! the authorization gate evaluated before any operation runs.

use gatehouse_grants::{AccessRequest, Selection};
use gatehouse_state::{Role, User};
use gatehouse_types::{AmbiguityPolicy, Rights, SessionLog};
use tracing::debug;

use crate::Result;
use crate::args::Arguments;
use crate::context::Bastion;
use crate::error::Error;
use crate::operation::GrantedAccess;
use crate::session::Prompt;

/// argument naming the destination of `HasAccess` operations.
pub const ACCESS_ARG: &str = "access";
/// argument naming the group of group-scoped operations.
pub const GROUP_ARG: &str = "group";

/// evaluates rights levels for one calling session.
pub struct Gate<'a> {
    bastion: &'a Bastion,
    prompt: &'a dyn Prompt,
}

impl<'a> Gate<'a> {
    /// a gate for `bastion`, asking through `prompt` when needed.
    pub fn new(bastion: &'a Bastion, prompt: &'a dyn Prompt) -> Self {
        Self { bastion, prompt }
    }

    /// check `rights` for `user`.
    ///
    /// for `HasAccess` the requested destination is written to `log`
    /// before it is authorized, and the resolved destination is returned.
    pub async fn check(
        &self,
        rights: Rights,
        user: &User,
        args: &Arguments,
        log: &mut SessionLog,
    ) -> Result<Option<GrantedAccess>> {
        let directory = self.bastion.directory();
        match rights {
            Rights::Public => Ok(None),
            Rights::Private => {
                if user.is_root() {
                    Ok(None)
                } else {
                    Err(Error::Authorization("only root may run this command".into()))
                }
            }
            Rights::BastionOwner => {
                if directory.is_bastion_owner(user) {
                    Ok(None)
                } else {
                    Err(Error::Authorization("you are not a bastion owner".into()))
                }
            }
            Rights::HasAccess => {
                let input = args.require(ACCESS_ARG)?;
                let request = self.bastion.engine().parse_request(input).await?;
                log.set_destination(&request.host, &request.user, request.port);
                self.resolve_destination(user, input, &request).await.map(Some)
            }
            Rights::GroupMember
            | Rights::GroupAclKeeper
            | Rights::GroupGateKeeper
            | Rights::GroupOwner => {
                let group = args.require(GROUP_ARG)?;
                directory.group(group).await?;
                self.check_role(rights, user, group)?;
                Ok(None)
            }
        }
    }

    fn check_role(&self, rights: Rights, user: &User, group: &str) -> Result<()> {
        let role = match rights {
            Rights::GroupMember => Role::Member,
            Rights::GroupAclKeeper => Role::AclKeeper,
            Rights::GroupGateKeeper => Role::GateKeeper,
            _ => Role::Owner,
        };
        let allowed = user.has_role(group, role)
            || (role == Role::Owner && self.bastion.directory().is_bastion_owner(user));
        if allowed {
            Ok(())
        } else {
            Err(Error::Authorization(format!(
                "you must be {} of group {group}",
                role_article(role)
            )))
        }
    }

    /// resolve `request`, typed as `input`, against everything `user` is
    /// granted.
    pub async fn resolve_destination(
        &self,
        user: &User,
        input: &str,
        request: &AccessRequest,
    ) -> Result<GrantedAccess> {
        let sets = self.bastion.directory().access_sets(user).await?;
        let resolution = self.bastion.engine().resolve(&sets, request);
        debug!(
            account = %user.name,
            input,
            authorized = resolution.authorized,
            matches = resolution.accesses.len(),
            "resolved destination"
        );

        let destination = match resolution.select() {
            Selection::Denied => {
                return Err(Error::Authorization(format!("you have no access to {input}")));
            }
            Selection::Unique(access) => access,
            Selection::Ambiguous(candidates) => {
                let shown: Vec<String> = candidates.iter().map(|a| a.short_string()).collect();
                let picked = match self.bastion.config().access.ambiguity {
                    AmbiguityPolicy::Reject => None,
                    AmbiguityPolicy::Prompt => self
                        .prompt
                        .choose(&format!("{input} matches several destinations:"), &shown),
                };
                match picked.and_then(|i| candidates.into_iter().nth(i)) {
                    Some(access) => access,
                    None => return Err(Error::Ambiguous(shown)),
                }
            }
        };

        Ok(GrantedAccess {
            destination,
            key_paths: resolution.key_paths,
            sources: resolution.sources,
        })
    }
}

fn role_article(role: Role) -> &'static str {
    match role {
        Role::Member => "a member",
        Role::AclKeeper => "an acl-keeper",
        Role::GateKeeper => "a gate-keeper",
        Role::Owner => "an owner",
    }
}
