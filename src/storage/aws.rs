//! DynamoDB, S3 and Cognito implementations of the remote seams.

use crate::commands::admin::{AuthError, IdentityProvider, SignIn, TemporaryCredentials};
use crate::commands::settings::RemoteSettings;
use crate::storage::remote::{ContentRecord, ContentTable, ObjectStore, RemoteBackend, MAX_BATCH_ITEMS};
use crate::storage::{BoxFuture, StorageError};
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_cognitoidentityprovider::operation::initiate_auth::InitiateAuthOutput;
use aws_sdk_cognitoidentityprovider::types::AuthFlowType;
use aws_sdk_dynamodb::types::{AttributeValue, PutRequest, WriteRequest};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use std::collections::HashMap;
use std::time::Duration;

fn network<E: std::fmt::Display>(err: E) -> StorageError {
    StorageError::Network(err.to_string())
}

fn record_item(record: &ContentRecord) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (
            "fieldName".to_string(),
            AttributeValue::S(record.field_name.clone()),
        ),
        ("content".to_string(), AttributeValue::S(record.content.clone())),
        (
            "updatedAt".to_string(),
            AttributeValue::S(record.updated_at.clone()),
        ),
    ])
}

fn string_attr(item: &HashMap<String, AttributeValue>, name: &str) -> Option<String> {
    item.get(name).and_then(|v| v.as_s().ok()).cloned()
}

fn item_record(item: &HashMap<String, AttributeValue>) -> Option<ContentRecord> {
    Some(ContentRecord {
        field_name: string_attr(item, "fieldName")?,
        content: string_attr(item, "content").unwrap_or_default(),
        updated_at: string_attr(item, "updatedAt").unwrap_or_default(),
    })
}

pub struct DynamoTable {
    client: aws_sdk_dynamodb::Client,
    table_name: String,
}

impl DynamoTable {
    pub fn new(config: &SdkConfig, table_name: &str) -> Self {
        DynamoTable {
            client: aws_sdk_dynamodb::Client::new(config),
            table_name: table_name.to_string(),
        }
    }

    async fn scan_all(&self) -> Result<Vec<ContentRecord>, StorageError> {
        let mut records = Vec::new();
        let mut start_key = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table_name)
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(network)?;

            records.extend(output.items().iter().filter_map(item_record));

            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(records)
    }

    async fn batch_put_all(&self, records: Vec<ContentRecord>) -> Result<(), StorageError> {
        debug_assert!(records.len() <= MAX_BATCH_ITEMS);

        let mut requests = Vec::with_capacity(records.len());
        for record in &records {
            let put = PutRequest::builder()
                .set_item(Some(record_item(record)))
                .build()
                .map_err(network)?;
            requests.push(WriteRequest::builder().put_request(put).build());
        }

        let output = self
            .client
            .batch_write_item()
            .request_items(&self.table_name, requests)
            .send()
            .await
            .map_err(network)?;

        let unprocessed = output
            .unprocessed_items()
            .and_then(|items| items.get(&self.table_name))
            .map(Vec::len)
            .unwrap_or(0);
        if unprocessed > 0 {
            return Err(StorageError::Network(format!(
                "{unprocessed} items were left unprocessed"
            )));
        }
        Ok(())
    }
}

impl ContentTable for DynamoTable {
    fn scan(&self) -> BoxFuture<'_, Result<Vec<ContentRecord>, StorageError>> {
        Box::pin(self.scan_all())
    }

    fn get_record<'a>(
        &'a self,
        field_name: &'a str,
    ) -> BoxFuture<'a, Result<Option<ContentRecord>, StorageError>> {
        Box::pin(async move {
            let output = self
                .client
                .get_item()
                .table_name(&self.table_name)
                .key("fieldName", AttributeValue::S(field_name.to_string()))
                .send()
                .await
                .map_err(network)?;
            Ok(output.item().and_then(item_record))
        })
    }

    fn put_record(&self, record: ContentRecord) -> BoxFuture<'_, Result<(), StorageError>> {
        Box::pin(async move {
            self.client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(record_item(&record)))
                .send()
                .await
                .map_err(network)?;
            Ok(())
        })
    }

    fn batch_put(&self, records: Vec<ContentRecord>) -> BoxFuture<'_, Result<(), StorageError>> {
        Box::pin(self.batch_put_all(records))
    }
}

pub struct S3Objects {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Objects {
    pub fn new(config: &SdkConfig, bucket: &str) -> Self {
        S3Objects {
            client: aws_sdk_s3::Client::new(config),
            bucket: bucket.to_string(),
        }
    }
}

impl ObjectStore for S3Objects {
    fn put_object<'a>(
        &'a self,
        key: &'a str,
        bytes: &'a [u8],
        content_type: &'a str,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(ByteStream::from(bytes.to_vec()))
                .content_type(content_type)
                .send()
                .await
                .map_err(network)?;
            Ok(())
        })
    }

    fn presign_get<'a>(
        &'a self,
        key: &'a str,
        ttl: Duration,
    ) -> BoxFuture<'a, Result<String, StorageError>> {
        Box::pin(async move {
            let presigning = PresigningConfig::expires_in(ttl).map_err(network)?;
            let request = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .presigned(presigning)
                .await
                .map_err(network)?;
            Ok(request.uri().to_string())
        })
    }
}

/// Cognito user pool sign-in followed by an identity pool credential exchange.
pub struct CognitoIdentity {
    user_pool: aws_sdk_cognitoidentityprovider::Client,
    identity_pool: aws_sdk_cognitoidentity::Client,
    client_id: String,
    identity_pool_id: String,
    login_key: String,
}

impl CognitoIdentity {
    pub async fn new(remote: &RemoteSettings) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(remote.region.clone()))
            .no_credentials()
            .load()
            .await;

        CognitoIdentity {
            user_pool: aws_sdk_cognitoidentityprovider::Client::new(&config),
            identity_pool: aws_sdk_cognitoidentity::Client::new(&config),
            client_id: remote.client_id.clone(),
            identity_pool_id: remote.identity_pool_id.clone(),
            login_key: format!(
                "cognito-idp.{}.amazonaws.com/{}",
                remote.region, remote.user_pool_id
            ),
        }
    }
}

fn tokens(output: &InitiateAuthOutput) -> Result<SignIn, AuthError> {
    let result = output
        .authentication_result()
        .ok_or_else(|| AuthError::Provider("sign-in returned no tokens".to_string()))?;
    let id_token = result
        .id_token()
        .ok_or_else(|| AuthError::Provider("sign-in returned no identity token".to_string()))?;
    Ok(SignIn {
        id_token: id_token.to_string(),
        refresh_token: result.refresh_token().map(str::to_string),
    })
}

impl IdentityProvider for CognitoIdentity {
    fn sign_in<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<SignIn, AuthError>> {
        Box::pin(async move {
            let output = self
                .user_pool
                .initiate_auth()
                .auth_flow(AuthFlowType::UserPasswordAuth)
                .client_id(&self.client_id)
                .auth_parameters("USERNAME", email)
                .auth_parameters("PASSWORD", password)
                .send()
                .await
                .map_err(|e| AuthError::InvalidCredentials(e.to_string()))?;
            tokens(&output)
        })
    }

    fn refresh<'a>(
        &'a self,
        _email: &'a str,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<SignIn, AuthError>> {
        Box::pin(async move {
            let output = self
                .user_pool
                .initiate_auth()
                .auth_flow(AuthFlowType::RefreshTokenAuth)
                .client_id(&self.client_id)
                .auth_parameters("REFRESH_TOKEN", refresh_token)
                .send()
                .await
                .map_err(|e| AuthError::InvalidCredentials(e.to_string()))?;
            tokens(&output)
        })
    }

    fn exchange<'a>(&'a self, id_token: &'a str) -> BoxFuture<'a, Result<TemporaryCredentials, AuthError>> {
        Box::pin(async move {
            let identity = self
                .identity_pool
                .get_id()
                .identity_pool_id(&self.identity_pool_id)
                .logins(&self.login_key, id_token)
                .send()
                .await
                .map_err(|e| AuthError::Provider(e.to_string()))?;
            let identity_id = identity
                .identity_id()
                .ok_or_else(|| AuthError::Provider("no identity id issued".to_string()))?;

            let output = self
                .identity_pool
                .get_credentials_for_identity()
                .identity_id(identity_id)
                .logins(&self.login_key, id_token)
                .send()
                .await
                .map_err(|e| AuthError::Provider(e.to_string()))?;
            let creds = output
                .credentials()
                .ok_or_else(|| AuthError::Provider("no credentials issued".to_string()))?;

            let field = |value: Option<&str>, name: &str| {
                value
                    .map(str::to_string)
                    .ok_or_else(|| AuthError::Provider(format!("credentials missing {name}")))
            };

            Ok(TemporaryCredentials {
                access_key_id: field(creds.access_key_id(), "access key")?,
                secret_access_key: field(creds.secret_key(), "secret key")?,
                session_token: field(creds.session_token(), "session token")?,
                expires_at: creds
                    .expiration()
                    .and_then(|t| chrono::DateTime::from_timestamp(t.secs(), 0)),
            })
        })
    }
}

/// Builds the remote backend from the temporary credentials of an admin session.
pub async fn connect(
    remote: &RemoteSettings,
    credentials: &TemporaryCredentials,
) -> RemoteBackend<DynamoTable, S3Objects> {
    let provider = aws_credential_types::Credentials::new(
        credentials.access_key_id.clone(),
        credentials.secret_access_key.clone(),
        Some(credentials.session_token.clone()),
        None,
        "cognito-identity",
    );
    let config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(remote.region.clone()))
        .credentials_provider(provider)
        .load()
        .await;

    RemoteBackend::new(
        DynamoTable::new(&config, &remote.table),
        S3Objects::new(&config, &remote.bucket),
    )
    .with_photo_key(&remote.photo_key)
    .with_presign_ttl(Duration::from_secs(remote.presign_ttl_secs))
    .with_request_timeout(remote.request_timeout())
}
