#[cfg(feature = "lambda")]
use crate::domain::ports::ObjectStore;
#[cfg(feature = "lambda")]
use crate::utils::error::{DurableError, Result};
#[cfg(feature = "lambda")]
use aws_sdk_s3::error::ProvideErrorMetadata;
#[cfg(feature = "lambda")]
use aws_sdk_s3::Client as S3Client;
#[cfg(feature = "lambda")]
use std::env;

#[cfg(feature = "lambda")]
#[derive(Debug, Clone)]
pub struct LambdaConfig {
    pub s3_bucket: String,
    pub s3_prefix: String,
    pub s3_region: String,
    pub max_attempts: u32,
}

#[cfg(feature = "lambda")]
impl LambdaConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            s3_bucket: env::var("S3_BUCKET").map_err(|_| DurableError::MissingConfigError {
                field: "S3_BUCKET".to_string(),
            })?,
            s3_prefix: env::var("S3_PREFIX").unwrap_or_else(|_| "generated-images".to_string()),
            s3_region: env::var("S3_REGION").unwrap_or_else(|_| "ap-southeast-2".to_string()),
            max_attempts: env::var("MAX_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
        })
    }

    pub fn retry_policy(&self) -> crate::core::RetryPolicy {
        crate::core::RetryPolicy::exponential().with_max_attempts(self.max_attempts)
    }
}

#[cfg(feature = "lambda")]
impl crate::utils::validation::Validate for LambdaConfig {
    fn validate(&self) -> Result<()> {
        use crate::utils::validation::*;

        // 驗證S3 bucket名稱
        validate_s3_bucket_name("s3_bucket", &self.s3_bucket)?;

        // 驗證S3前綴
        validate_non_empty_string("s3_prefix", &self.s3_prefix)?;

        // 驗證區域
        validate_aws_region("s3_region", &self.s3_region)?;

        validate_range("max_attempts", self.max_attempts, 1, 20)?;

        tracing::info!("✅ Lambda configuration validation passed");
        Ok(())
    }
}

#[cfg(feature = "lambda")]
fn validate_s3_bucket_name(field_name: &str, bucket_name: &str) -> Result<()> {
    let invalid = |reason: &str| DurableError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: bucket_name.to_string(),
        reason: reason.to_string(),
    };

    if bucket_name.len() < 3 || bucket_name.len() > 63 {
        return Err(invalid("S3 bucket name must be between 3 and 63 characters"));
    }

    if !bucket_name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(invalid(
            "S3 bucket name can only contain lowercase letters, numbers, hyphens, and dots",
        ));
    }

    if bucket_name.starts_with('-') || bucket_name.ends_with('-') {
        return Err(invalid("S3 bucket name cannot start or end with a hyphen"));
    }

    Ok(())
}

#[cfg(feature = "lambda")]
fn validate_aws_region(field_name: &str, region: &str) -> Result<()> {
    crate::utils::validation::validate_non_empty_string(field_name, region)?;

    if !region
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(DurableError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: region.to_string(),
            reason: "AWS region can only contain lowercase letters, numbers, and hyphens"
                .to_string(),
        });
    }

    Ok(())
}

/// 圖片輸出寫到 S3，路徑前面加上 `prefix`
#[cfg(feature = "lambda")]
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: S3Client,
    bucket: String,
    prefix: String,
}

#[cfg(feature = "lambda")]
impl S3Storage {
    pub fn new(client: S3Client, bucket: String, prefix: String) -> Self {
        Self {
            client,
            bucket,
            prefix,
        }
    }

    fn object_key(&self, path: &str) -> String {
        format!("{}/{}", self.prefix.trim_end_matches('/'), path)
    }
}

#[cfg(feature = "lambda")]
impl ObjectStore for S3Storage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.object_key(path))
            .send()
            .await
            .map_err(|e| DurableError::StorageError {
                message: format!(
                    "Failed to read {} from S3 ({}): {}",
                    path,
                    e.code().unwrap_or("unknown"),
                    e
                ),
            })?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| DurableError::StorageError {
                message: format!("Failed to collect S3 data: {}", e),
            })?;

        Ok(data.into_bytes().to_vec())
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.object_key(path))
            .body(data.to_vec().into())
            .send()
            .await
            .map_err(|e| DurableError::StorageError {
                message: format!(
                    "Failed to write {} to S3 ({}): {}",
                    path,
                    e.code().unwrap_or("unknown"),
                    e
                ),
            })?;

        tracing::debug!(bucket = %self.bucket, path, "Wrote object to S3");
        Ok(())
    }
}

#[cfg(all(test, feature = "lambda"))]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_name_rules() {
        assert!(validate_s3_bucket_name("s3_bucket", "my-image-bucket").is_ok());
        assert!(validate_s3_bucket_name("s3_bucket", "ab").is_err());
        assert!(validate_s3_bucket_name("s3_bucket", "Upper_Case").is_err());
        assert!(validate_s3_bucket_name("s3_bucket", "-leading").is_err());
    }

    #[test]
    fn test_region_rules() {
        assert!(validate_aws_region("s3_region", "ap-southeast-2").is_ok());
        assert!(validate_aws_region("s3_region", "").is_err());
        assert!(validate_aws_region("s3_region", "AP_SOUTH").is_err());
    }
}
