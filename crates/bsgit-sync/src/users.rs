//! Two-way mapping between build service logins and git identities.

use bsgit_cache::keys;
use bsgit_git::Ident;

use crate::context::Fetcher;
use crate::error::SyncError;
use crate::Result;

/// Accounts the build service fabricates; never worth a person query.
const PSEUDO_ACCOUNTS: &[(&str, &str)] = &[
    ("unknown", "UNKNOWN"),
    ("buildservice-autocommit", "BUILDSERVICE-AUTOCOMMIT"),
];

impl Fetcher<'_> {
    /// Resolve a login to the `(name, email)` pair used on commits.
    ///
    /// Cache first; the person record is fetched only when a field is
    /// missing, and only the missing field is stored. An email already
    /// recorded (by an earlier run or by `usermap`) is never replaced
    /// here. Fields the server does not report fall back to the login
    /// itself.
    pub(crate) fn user_ident(&mut self, login: &str) -> Result<Ident> {
        if let Some((_, email)) = PSEUDO_ACCOUNTS.iter().find(|(l, _)| *l == login) {
            return Ok(Ident {
                name: login.to_string(),
                email: email.to_string(),
            });
        }

        let email_key = keys::email(login);
        let realname_key = keys::realname(login);
        let cached_email = self.cache.get_str(&email_key)?;
        let cached_name = self.cache.get_str(&realname_key)?;
        if let (Some(email), Some(name)) = (&cached_email, &cached_name) {
            return Ok(Ident {
                name: name.clone(),
                email: email.clone(),
            });
        }

        let record = self.service.get_user(login)?;
        let email = match cached_email {
            Some(email) => email,
            None => {
                let email = record.email.unwrap_or_else(|| login.to_string());
                self.cache.put(&email_key, email.as_bytes())?;
                self.cache.put(&keys::login(&email), login.as_bytes())?;
                email
            }
        };
        let name = match cached_name {
            Some(name) => name,
            None => {
                let name = record.realname.unwrap_or_else(|| login.to_string());
                self.cache.put(&realname_key, name.as_bytes())?;
                name
            }
        };
        Ok(Ident { name, email })
    }

    /// Resolve an email back to a login. Cache only; an unknown email
    /// is fatal and points the user at `bsgit usermap`.
    pub(crate) fn login_for_email(&self, email: &str) -> Result<String> {
        if let Some((login, _)) = PSEUDO_ACCOUNTS.iter().find(|(_, e)| *e == email) {
            return Ok(login.to_string());
        }
        self.cache
            .get_str(&keys::login(email))?
            .ok_or_else(|| SyncError::UnmappedEmail {
                email: email.to_string(),
            })
    }

    /// Like [`login_for_email`](Self::login_for_email) but quiet about
    /// unknown addresses; used for the advisory author check on push.
    pub(crate) fn try_login_for_email(&self, email: &str) -> Result<Option<String>> {
        match self.login_for_email(email) {
            Ok(login) => Ok(Some(login)),
            Err(SyncError::UnmappedEmail { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
