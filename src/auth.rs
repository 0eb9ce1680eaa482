use argon2::{
    Argon2, PasswordVerifier,
    password_hash::{PasswordHash, PasswordHasher, SaltString, rand_core::OsRng},
};

use crate::models::{NewUser, User};
use crate::storage::Storage;

pub const MIN_PASSWORD_LEN: usize = 6;

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, hash: &str) -> anyhow::Result<()> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|e| anyhow::anyhow!("Failed to verify password: {}", e))?;
    Ok(())
}

/// Create a user from a plain-text password.
pub async fn register(storage: &dyn Storage, user: NewUser) -> anyhow::Result<User> {
    let password = hash_password(&user.password)?;
    storage.create_user(NewUser { password, ..user }).await
}

/// `None` for an unknown username or a wrong password.
pub async fn login(
    storage: &dyn Storage,
    username: &str,
    password: &str,
) -> anyhow::Result<Option<User>> {
    let Some(user) = storage.get_user_by_username(username).await? else {
        return Ok(None);
    };
    Ok(verify_password(password, &user.password).ok().map(|_| user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStorage;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("obrigado").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("obrigado", &hash).is_ok());
        assert!(verify_password("obrigada", &hash).is_err());
        assert!(verify_password("obrigado", "plain text").is_err());
    }

    #[tokio::test]
    async fn register_and_login() {
        let storage = MemStorage::new();
        let user = register(
            &storage,
            NewUser {
                username: "joao".into(),
                password: "saudade".into(),
                display_name: "João".into(),
            },
        )
        .await
        .unwrap();
        assert_ne!(user.password, "saudade");
        assert_eq!(login(&storage, "joao", "saudade").await.unwrap().unwrap().id, user.id);
        assert!(login(&storage, "joao", "wrong").await.unwrap().is_none());
        assert!(login(&storage, "nobody", "saudade").await.unwrap().is_none());
    }
}
