//! CloudWatch Logs groups and streams

use super::error::from_sdk;
use super::{LogStreamSummary, LogsApi};
use crate::error::ApiResult;
use crate::resource::Page;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudwatchlogs::Client;

const LOG_PAGE_SIZE: i32 = 50;

#[derive(Clone)]
pub struct AwsLogs {
    client: Client,
}

impl AwsLogs {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self::from_client(Client::new(sdk_config))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

fn non_empty(prefix: &str) -> Option<String> {
    (!prefix.is_empty()).then(|| prefix.to_string())
}

#[async_trait]
impl LogsApi for AwsLogs {
    async fn describe_log_groups(&self, prefix: &str, next_token: Option<String>) -> ApiResult<Page<String>> {
        let resp = self
            .client
            .describe_log_groups()
            .set_log_group_name_prefix(non_empty(prefix))
            .limit(LOG_PAGE_SIZE)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| from_sdk("DescribeLogGroups", e))?;

        let names = resp
            .log_groups()
            .iter()
            .filter_map(|g| g.log_group_name())
            .map(str::to_string)
            .collect();
        Ok(Page::new(names, resp.next_token().map(str::to_string)))
    }

    async fn create_log_group(&self, name: &str) -> ApiResult<()> {
        self.client
            .create_log_group()
            .log_group_name(name)
            .send()
            .await
            .map_err(|e| from_sdk("CreateLogGroup", e))?;
        Ok(())
    }

    async fn put_retention_policy(&self, name: &str, days: i32) -> ApiResult<()> {
        self.client
            .put_retention_policy()
            .log_group_name(name)
            .retention_in_days(days)
            .send()
            .await
            .map_err(|e| from_sdk("PutRetentionPolicy", e))?;
        Ok(())
    }

    async fn delete_log_group(&self, name: &str) -> ApiResult<()> {
        self.client
            .delete_log_group()
            .log_group_name(name)
            .send()
            .await
            .map_err(|e| from_sdk("DeleteLogGroup", e))?;
        Ok(())
    }

    async fn describe_log_streams(
        &self,
        group: &str,
        prefix: &str,
        next_token: Option<String>,
    ) -> ApiResult<Page<LogStreamSummary>> {
        let resp = self
            .client
            .describe_log_streams()
            .log_group_name(group)
            .set_log_stream_name_prefix(non_empty(prefix))
            .limit(LOG_PAGE_SIZE)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| from_sdk("DescribeLogStreams", e))?;

        let streams = resp
            .log_streams()
            .iter()
            .filter_map(|s| {
                Some(LogStreamSummary {
                    name: s.log_stream_name()?.to_string(),
                    creation_time: s.creation_time(),
                    last_event_timestamp: s.last_event_timestamp(),
                })
            })
            .collect();
        Ok(Page::new(streams, resp.next_token().map(str::to_string)))
    }

    async fn delete_log_stream(&self, group: &str, stream: &str) -> ApiResult<()> {
        self.client
            .delete_log_stream()
            .log_group_name(group)
            .log_stream_name(stream)
            .send()
            .await
            .map_err(|e| from_sdk("DeleteLogStream", e))?;
        Ok(())
    }
}
