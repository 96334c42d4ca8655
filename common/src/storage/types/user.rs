use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};
use uuid::Uuid;

stored_object!(User, "user", {
    username: String,
    email: String,
    password: String,
    approved: bool,
    admin: bool,
    #[serde(
        serialize_with = "serialize_option_datetime",
        deserialize_with = "deserialize_option_datetime",
        default
    )]
    last_login_at: Option<DateTime<Utc>>
});

/// What the API returns for a user. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub email: String,
    pub approved: bool,
    pub admin: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            approved: user.approved,
            admin: user.admin,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

#[derive(Deserialize)]
struct CountResult {
    count: i64,
}

impl User {
    /// Register a new user. The very first account becomes admin and is
    /// pre-approved so the instance can be bootstrapped without seeded
    /// credentials; everyone after that waits for admin approval.
    pub async fn create_new(
        username: String,
        email: String,
        password: String,
        db: &SurrealDbClient,
    ) -> Result<Self, AppError> {
        if username.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
            return Err(AppError::Validation(
                "Username, email and password are required".into(),
            ));
        }

        if Self::find_by_username(&username, db).await?.is_some() {
            return Err(AppError::Validation("Username already registered".into()));
        }
        if Self::find_by_email(&email, db).await?.is_some() {
            return Err(AppError::Validation("Email already registered".into()));
        }

        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        let user: Option<User> = db
            .client
            .query(
                "LET $count = (SELECT count() FROM type::table($table))[0].count;
             CREATE type::thing('user', $id) SET
                username = $username,
                email = $email,
                password = crypto::argon2::generate($password),
                admin = $count < 1,
                approved = $count < 1,
                created_at = $created_at,
                updated_at = $updated_at",
            )
            .bind(("table", "user"))
            .bind(("id", id))
            .bind(("username", username))
            .bind(("email", email))
            .bind(("password", password))
            .bind(("created_at", surrealdb::Datetime::from(now)))
            .bind(("updated_at", surrealdb::Datetime::from(now)))
            .await?
            .take(1)?;

        user.ok_or(AppError::Validation("User failed to create".into()))
    }

    /// Check credentials. A missing user and a wrong password produce the
    /// same error, nothing leaks about which one it was.
    pub async fn authenticate(
        username: &str,
        password: &str,
        db: &SurrealDbClient,
    ) -> Result<Self, AppError> {
        let user: Option<User> = db
            .client
            .query(
                "SELECT * FROM user
                WHERE username = $username
                AND crypto::argon2::compare(password, $password)",
            )
            .bind(("username", username.to_owned()))
            .bind(("password", password.to_owned()))
            .await?
            .take(0)?;
        user.ok_or(AppError::Auth("Invalid username or password".into()))
    }

    pub async fn find_by_username(
        username: &str,
        db: &SurrealDbClient,
    ) -> Result<Option<Self>, AppError> {
        let user: Option<User> = db
            .client
            .query("SELECT * FROM user WHERE username = $username LIMIT 1")
            .bind(("username", username.to_owned()))
            .await?
            .take(0)?;

        Ok(user)
    }

    pub async fn find_by_email(
        email: &str,
        db: &SurrealDbClient,
    ) -> Result<Option<Self>, AppError> {
        let user: Option<User> = db
            .client
            .query("SELECT * FROM user WHERE email = $email LIMIT 1")
            .bind(("email", email.to_owned()))
            .await?
            .take(0)?;

        Ok(user)
    }

    pub async fn record_login(id: &str, db: &SurrealDbClient) -> Result<(), AppError> {
        let now = Utc::now();
        db.client
            .query(
                "UPDATE type::thing('user', $id)
                SET last_login_at = $now, updated_at = $now",
            )
            .bind(("id", id.to_owned()))
            .bind(("now", surrealdb::Datetime::from(now)))
            .await?;
        Ok(())
    }

    pub async fn approve(id: &str, db: &SurrealDbClient) -> Result<Self, AppError> {
        let now = Utc::now();
        let user: Option<User> = db
            .client
            .query(
                "UPDATE type::thing('user', $id)
                SET approved = true, updated_at = $now
                RETURN AFTER",
            )
            .bind(("id", id.to_owned()))
            .bind(("now", surrealdb::Datetime::from(now)))
            .await?
            .take(0)?;

        user.ok_or(AppError::NotFound("User not found".into()))
    }

    pub async fn list_all(db: &SurrealDbClient) -> Result<Vec<Self>, AppError> {
        let users: Vec<User> = db
            .client
            .query("SELECT * FROM user ORDER BY created_at ASC")
            .await?
            .take(0)?;

        Ok(users)
    }

    /// (total, approved) user counts for the admin stats endpoint.
    pub async fn counts(db: &SurrealDbClient) -> Result<(i64, i64), AppError> {
        let total: Option<CountResult> = db
            .client
            .query("SELECT count() as count FROM user GROUP ALL")
            .await?
            .take(0)?;
        let approved: Option<CountResult> = db
            .client
            .query("SELECT count() as count FROM user WHERE approved = true GROUP ALL")
            .await?
            .take(0)?;

        Ok((
            total.map(|r| r.count).unwrap_or(0),
            approved.map(|r| r.count).unwrap_or(0),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_test_db() -> SurrealDbClient {
        let namespace = "test_ns";
        let database = Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory(namespace, &database)
            .await
            .expect("Failed to start in-memory surrealdb");

        db.apply_migrations()
            .await
            .expect("Failed to apply migrations");

        db
    }

    #[tokio::test]
    async fn test_first_user_is_admin_and_approved() {
        let db = setup_test_db().await;

        let first = User::create_new(
            "alice".into(),
            "alice@example.com".into(),
            "password1".into(),
            &db,
        )
        .await
        .expect("Failed to create first user");

        assert!(first.admin);
        assert!(first.approved);
        assert_ne!(first.password, "password1"); // hashed at rest

        let second = User::create_new(
            "bob".into(),
            "bob@example.com".into(),
            "password2".into(),
            &db,
        )
        .await
        .expect("Failed to create second user");

        assert!(!second.admin);
        assert!(!second.approved);
        assert!(second.last_login_at.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let db = setup_test_db().await;

        User::create_new(
            "carol".into(),
            "carol@example.com".into(),
            "password".into(),
            &db,
        )
        .await
        .expect("Failed to create user");

        let same_username = User::create_new(
            "carol".into(),
            "other@example.com".into(),
            "password".into(),
            &db,
        )
        .await;
        assert!(matches!(same_username, Err(AppError::Validation(_))));

        let same_email = User::create_new(
            "other".into(),
            "carol@example.com".into(),
            "password".into(),
            &db,
        )
        .await;
        assert!(matches!(same_email, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_authentication() {
        let db = setup_test_db().await;

        User::create_new(
            "dave".into(),
            "dave@example.com".into(),
            "secret".into(),
            &db,
        )
        .await
        .expect("Failed to create user");

        assert!(User::authenticate("dave", "secret", &db).await.is_ok());
        assert!(User::authenticate("dave", "wrong", &db).await.is_err());
        assert!(User::authenticate("nobody", "secret", &db).await.is_err());
    }

    #[tokio::test]
    async fn test_approval_flow() {
        let db = setup_test_db().await;

        // First user only bootstraps the admin
        User::create_new(
            "admin".into(),
            "admin@example.com".into(),
            "rootpw".into(),
            &db,
        )
        .await
        .expect("Failed to create admin");

        let pending = User::create_new(
            "erin".into(),
            "erin@example.com".into(),
            "password".into(),
            &db,
        )
        .await
        .expect("Failed to create user");
        assert!(!pending.approved);

        let approved = User::approve(&pending.id, &db)
            .await
            .expect("Failed to approve user");
        assert!(approved.approved);

        let missing = User::approve("does-not-exist", &db).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_record_login_sets_timestamp() {
        let db = setup_test_db().await;

        let user = User::create_new(
            "frank".into(),
            "frank@example.com".into(),
            "password".into(),
            &db,
        )
        .await
        .expect("Failed to create user");
        assert!(user.last_login_at.is_none());

        User::record_login(&user.id, &db)
            .await
            .expect("Failed to record login");

        let reloaded: Option<User> = db.get_item(&user.id).await.expect("Failed to fetch user");
        assert!(reloaded.expect("user exists").last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_counts() {
        let db = setup_test_db().await;

        User::create_new("a".into(), "a@example.com".into(), "pw".into(), &db)
            .await
            .expect("first");
        User::create_new("b".into(), "b@example.com".into(), "pw".into(), &db)
            .await
            .expect("second");

        let (total, approved) = User::counts(&db).await.expect("counts");
        assert_eq!(total, 2);
        assert_eq!(approved, 1); // only the bootstrap admin
    }
}
