//! Payment Gateway Abstraction
//!
//! 网关是外部不透明服务，这里只约定三个结果返回的异步操作。
//! 传输失败和业务拒绝是两类错误：前者可重试，后者终结本次支付。

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use uuid::Uuid;

/// Gateway error types
#[derive(Debug, Error)]
pub enum GatewayError {
    /// 网关不可达 / 超时，调用方可重试
    #[error("Gateway transport error: {0}")]
    Transport(String),

    /// 网关明确拒绝 (余额不足、审批无效等)
    #[error("Gateway rejected: {0}")]
    Rejected(String),
}

/// 创建扣款的请求
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChargeRequest {
    pub amount: f64,
    pub currency: String,
    pub description: String,
    pub return_url: String,
    pub cancel_url: String,
}

/// 网关侧创建成功的扣款
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedCharge {
    /// 网关 charge id，后续 execute/refund/webhook 都以它关联
    pub charge_id: String,
    /// 买家审批跳转地址
    pub approval_url: String,
}

/// 支付网关接口
///
/// create → (买家网关侧审批) → execute → (可选) refund。
/// 所有实现必须 Send + Sync，协调器以 `Arc<dyn PaymentGateway>` 共享。
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// 创建扣款请求，返回审批跳转句柄
    async fn create_charge(&self, req: CreateChargeRequest)
        -> Result<CreatedCharge, GatewayError>;

    /// 买家审批后执行扣款 (资金在此捕获)
    async fn execute_charge(
        &self,
        charge_id: &str,
        approval_token: &str,
    ) -> Result<(), GatewayError>;

    /// 退款已执行的扣款，返回网关退款 id
    async fn refund_charge(
        &self,
        charge_id: &str,
        amount: f64,
        currency: &str,
    ) -> Result<String, GatewayError>;
}

// ============================================================================
// HTTP Gateway
// ============================================================================

/// 通用 HTTP JSON 网关客户端
///
/// 线协议刻意保持最小：
/// - `POST {base}/charges` → `{ chargeId, approvalUrl }`
/// - `POST {base}/charges/{id}/execute`
/// - `POST {base}/charges/{id}/refund` → `{ refundId }`
#[derive(Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteBody<'a> {
    approval_token: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefundBody<'a> {
    amount: f64,
    currency: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefundResponse {
    refund_id: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, timeout: std::time::Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// 非 2xx → Rejected，带网关返回的 body 文本
    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(GatewayError::Rejected(format!("{}: {}", status, body)))
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn create_charge(
        &self,
        req: CreateChargeRequest,
    ) -> Result<CreatedCharge, GatewayError> {
        let resp = self
            .client
            .post(format!("{}/charges", self.base_url))
            .json(&req)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let resp = Self::check_status(resp).await?;
        resp.json::<CreatedCharge>()
            .await
            .map_err(|e| GatewayError::Transport(format!("Invalid gateway response: {e}")))
    }

    async fn execute_charge(
        &self,
        charge_id: &str,
        approval_token: &str,
    ) -> Result<(), GatewayError> {
        let resp = self
            .client
            .post(format!("{}/charges/{}/execute", self.base_url, charge_id))
            .json(&ExecuteBody { approval_token })
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Self::check_status(resp).await?;
        Ok(())
    }

    async fn refund_charge(
        &self,
        charge_id: &str,
        amount: f64,
        currency: &str,
    ) -> Result<String, GatewayError> {
        let resp = self
            .client
            .post(format!("{}/charges/{}/refund", self.base_url, charge_id))
            .json(&RefundBody { amount, currency })
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let resp = Self::check_status(resp).await?;
        resp.json::<RefundResponse>()
            .await
            .map(|r| r.refund_id)
            .map_err(|e| GatewayError::Transport(format!("Invalid gateway response: {e}")))
    }
}

// ============================================================================
// Mock Gateway
// ============================================================================

/// Mock 扣款状态
#[derive(Debug, Clone, PartialEq, Eq)]
enum MockChargeState {
    Created,
    Executed,
    Refunded,
}

/// 内存 Mock 网关
///
/// 开发模式 (`GATEWAY_MODE=mock`) 和测试使用。
/// 支持注入执行失败 / 传输失败来演练各失败路径。
#[derive(Default)]
pub struct MockGateway {
    charges: Mutex<HashMap<String, MockChargeState>>,
    fail_execute: AtomicBool,
    fail_transport: AtomicBool,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// 之后的 execute 一律拒绝
    pub fn set_fail_execute(&self, fail: bool) {
        self.fail_execute.store(fail, Ordering::SeqCst);
    }

    /// 之后的所有调用模拟网关不可达
    pub fn set_fail_transport(&self, fail: bool) {
        self.fail_transport.store(fail, Ordering::SeqCst);
    }

    /// 扣款是否处于已执行状态 (测试断言用)
    pub fn is_executed(&self, charge_id: &str) -> bool {
        self.charges.lock().get(charge_id) == Some(&MockChargeState::Executed)
    }

    /// 扣款是否已退款 (测试断言用)
    pub fn is_refunded(&self, charge_id: &str) -> bool {
        self.charges.lock().get(charge_id) == Some(&MockChargeState::Refunded)
    }

    fn check_transport(&self) -> Result<(), GatewayError> {
        if self.fail_transport.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("mock transport failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_charge(
        &self,
        _req: CreateChargeRequest,
    ) -> Result<CreatedCharge, GatewayError> {
        self.check_transport()?;
        let charge_id = format!("MOCK{}", Uuid::new_v4().simple());
        self.charges
            .lock()
            .insert(charge_id.clone(), MockChargeState::Created);
        Ok(CreatedCharge {
            approval_url: format!("mock://approve/{}", charge_id),
            charge_id,
        })
    }

    async fn execute_charge(
        &self,
        charge_id: &str,
        _approval_token: &str,
    ) -> Result<(), GatewayError> {
        self.check_transport()?;
        if self.fail_execute.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected("mock execute rejected".to_string()));
        }
        let mut charges = self.charges.lock();
        match charges.get(charge_id) {
            Some(MockChargeState::Created) | Some(MockChargeState::Executed) => {
                charges.insert(charge_id.to_string(), MockChargeState::Executed);
                Ok(())
            }
            Some(MockChargeState::Refunded) => {
                Err(GatewayError::Rejected("charge already refunded".to_string()))
            }
            None => Err(GatewayError::Rejected(format!(
                "unknown charge {}",
                charge_id
            ))),
        }
    }

    async fn refund_charge(
        &self,
        charge_id: &str,
        _amount: f64,
        _currency: &str,
    ) -> Result<String, GatewayError> {
        self.check_transport()?;
        let mut charges = self.charges.lock();
        match charges.get(charge_id) {
            Some(MockChargeState::Executed) | Some(MockChargeState::Created) => {
                charges.insert(charge_id.to_string(), MockChargeState::Refunded);
                Ok(format!("REFUND-{}", charge_id))
            }
            Some(MockChargeState::Refunded) => Ok(format!("REFUND-{}", charge_id)),
            None => Err(GatewayError::Rejected(format!(
                "unknown charge {}",
                charge_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_charge_lifecycle() {
        let gateway = MockGateway::new();
        let created = gateway
            .create_charge(CreateChargeRequest {
                amount: 10.0,
                currency: "USD".to_string(),
                description: "test".to_string(),
                return_url: "http://localhost/return".to_string(),
                cancel_url: "http://localhost/cancel".to_string(),
            })
            .await
            .unwrap();

        gateway
            .execute_charge(&created.charge_id, "token")
            .await
            .unwrap();
        assert!(gateway.is_executed(&created.charge_id));

        gateway
            .refund_charge(&created.charge_id, 10.0, "USD")
            .await
            .unwrap();
        assert!(gateway.is_refunded(&created.charge_id));
    }

    #[tokio::test]
    async fn mock_failure_injection() {
        let gateway = MockGateway::new();
        let created = gateway
            .create_charge(CreateChargeRequest {
                amount: 10.0,
                currency: "USD".to_string(),
                description: "test".to_string(),
                return_url: "r".to_string(),
                cancel_url: "c".to_string(),
            })
            .await
            .unwrap();

        gateway.set_fail_execute(true);
        let err = gateway
            .execute_charge(&created.charge_id, "token")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Rejected(_)));

        gateway.set_fail_transport(true);
        let err = gateway
            .execute_charge(&created.charge_id, "token")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }
}
