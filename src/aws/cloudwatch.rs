//! CloudWatch metrics and alarms

use super::error::from_sdk;
use super::{AlarmRequest, CloudWatchApi};
use crate::config::{self, MetricStat};
use crate::error::ApiResult;
use crate::resource::Page;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudwatch::primitives::DateTime;
use aws_sdk_cloudwatch::types::{
    AlarmType, ComparisonOperator, Dimension, MetricDatum, StandardUnit, Statistic,
};
use aws_sdk_cloudwatch::Client;

const ALARM_PAGE_SIZE: i32 = 100;

#[derive(Clone)]
pub struct AwsCloudWatch {
    client: Client,
}

impl AwsCloudWatch {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl CloudWatchApi for AwsCloudWatch {
    async fn list_metrics(&self, namespace: &str, next_token: Option<String>) -> ApiResult<Page<String>> {
        let resp = self
            .client
            .list_metrics()
            .namespace(namespace)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| from_sdk("ListMetrics", e))?;

        let names = resp
            .metrics()
            .iter()
            .filter_map(|m| m.metric_name())
            .map(str::to_string)
            .collect();
        Ok(Page::new(names, resp.next_token().map(str::to_string)))
    }

    async fn put_metric_data(&self, metric: &MetricStat, value: f64) -> ApiResult<()> {
        let datum = MetricDatum::builder()
            .metric_name(&metric.metric.metric_name)
            .set_dimensions(Some(dimensions(&metric.metric.dimensions)))
            .timestamp(DateTime::from_secs(chrono::Utc::now().timestamp()))
            .value(value)
            .set_unit(metric.unit.as_deref().map(StandardUnit::from))
            .build();

        self.client
            .put_metric_data()
            .namespace(&metric.metric.namespace)
            .metric_data(datum)
            .send()
            .await
            .map_err(|e| from_sdk("PutMetricData", e))?;
        Ok(())
    }

    async fn describe_alarms(&self, prefix: &str, next_token: Option<String>) -> ApiResult<Page<String>> {
        let resp = self
            .client
            .describe_alarms()
            .alarm_name_prefix(prefix)
            .alarm_types(AlarmType::MetricAlarm)
            .max_records(ALARM_PAGE_SIZE)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| from_sdk("DescribeAlarms", e))?;

        let names = resp
            .metric_alarms()
            .iter()
            .filter_map(|a| a.alarm_name())
            .map(str::to_string)
            .collect();
        Ok(Page::new(names, resp.next_token().map(str::to_string)))
    }

    async fn put_metric_alarm(&self, request: &AlarmRequest<'_>) -> ApiResult<()> {
        let alarm = request.alarm;
        let metric = request.metric;

        let mut builder = self
            .client
            .put_metric_alarm()
            .alarm_name(&alarm.alarm_name)
            .set_alarm_description(alarm.alarm_description.clone())
            .set_ok_actions(Some(request.ok_actions.clone()))
            .set_alarm_actions(Some(request.alarm_actions.clone()))
            .evaluation_periods(alarm.evaluation_periods)
            .set_datapoints_to_alarm(alarm.datapoints_to_alarm)
            .threshold(alarm.threshold)
            .comparison_operator(ComparisonOperator::from(alarm.comparison_operator.as_str()))
            .set_treat_missing_data(alarm.treat_missing_data.clone())
            .namespace(&metric.metric.namespace)
            .metric_name(&metric.metric.metric_name)
            .set_dimensions(Some(dimensions(&metric.metric.dimensions)))
            .period(metric.period)
            .set_unit(metric.unit.as_deref().map(StandardUnit::from));

        // Percentiles such as p99 go through ExtendedStatistic
        builder = if is_standard_statistic(&metric.stat) {
            builder.statistic(Statistic::from(metric.stat.as_str()))
        } else {
            builder.extended_statistic(&metric.stat)
        };

        builder
            .send()
            .await
            .map_err(|e| from_sdk("PutMetricAlarm", e))?;
        Ok(())
    }

    async fn delete_alarms(&self, names: &[String]) -> ApiResult<()> {
        self.client
            .delete_alarms()
            .set_alarm_names(Some(names.to_vec()))
            .send()
            .await
            .map_err(|e| from_sdk("DeleteAlarms", e))?;
        Ok(())
    }
}

fn dimensions(dimensions: &[config::Dimension]) -> Vec<Dimension> {
    dimensions
        .iter()
        .map(|d| Dimension::builder().name(&d.name).value(&d.value).build())
        .collect()
}

fn is_standard_statistic(stat: &str) -> bool {
    matches!(stat, "SampleCount" | "Average" | "Sum" | "Minimum" | "Maximum")
}
