//! # Action Client
//!
//! Typed wrappers over `BridgeHandle::call` for the gateway actions the
//! service uses. Each wrapper builds the parameter object, issues one call
//! and decodes the payload.

use crate::bridge::BridgeHandle;
use crate::domain::{BridgeError, BridgeResult};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use shared_types::{GroupMemberInfo, LoginInfo, MessageReceipt, Uin};

/// Action names understood by the gateway.
pub mod action {
    pub const SEND_GROUP_MSG: &str = "send_group_msg";
    pub const SEND_PRIVATE_MSG: &str = "send_private_msg";
    pub const DELETE_MSG: &str = "delete_msg";
    pub const GET_GROUP_MEMBER_INFO: &str = "get_group_member_info";
    pub const GET_LOGIN_INFO: &str = "get_login_info";
}

#[derive(Debug, Clone)]
pub struct ActionClient {
    bridge: BridgeHandle,
}

impl ActionClient {
    pub fn new(bridge: BridgeHandle) -> Self {
        Self { bridge }
    }

    pub fn bridge(&self) -> &BridgeHandle {
        &self.bridge
    }

    /// Post a message to a group.
    ///
    /// With `auto_escape` the gateway sends `message` verbatim instead of
    /// parsing CQ codes out of it.
    pub async fn send_group_msg(
        &self,
        group_id: Uin,
        message: &str,
        auto_escape: bool,
    ) -> BridgeResult<MessageReceipt> {
        let params = json!({
            "group_id": group_id,
            "message": message,
            "auto_escape": auto_escape,
        });
        self.call_typed(action::SEND_GROUP_MSG, params).await
    }

    pub async fn send_private_msg(
        &self,
        user_id: Uin,
        message: &str,
        auto_escape: bool,
    ) -> BridgeResult<MessageReceipt> {
        let params = json!({
            "user_id": user_id,
            "message": message,
            "auto_escape": auto_escape,
        });
        self.call_typed(action::SEND_PRIVATE_MSG, params).await
    }

    /// Recall a message.
    pub async fn delete_msg(&self, message_id: i64) -> BridgeResult<()> {
        self.bridge
            .call(action::DELETE_MSG, json!({ "message_id": message_id }))
            .await
            .map(|_| ())
    }

    /// Look up one member of a group.
    ///
    /// Fails with `RemoteFailed` when the user is not in the group.
    pub async fn get_group_member_info(
        &self,
        group_id: Uin,
        user_id: Uin,
        no_cache: bool,
    ) -> BridgeResult<GroupMemberInfo> {
        let params = json!({
            "group_id": group_id,
            "user_id": user_id,
            "no_cache": no_cache,
        });
        self.call_typed(action::GET_GROUP_MEMBER_INFO, params).await
    }

    /// Account the gateway is logged in as.
    pub async fn get_login_info(&self) -> BridgeResult<LoginInfo> {
        self.call_typed(action::GET_LOGIN_INFO, Value::Object(Map::new()))
            .await
    }

    /// Any other action, payload returned untouched.
    pub async fn call_raw(&self, action: &str, params: Value) -> BridgeResult<Value> {
        self.bridge.call(action, params).await
    }

    async fn call_typed<T: DeserializeOwned>(&self, action: &str, params: Value) -> BridgeResult<T> {
        let data = match self.bridge.call(action, params).await? {
            Value::Null => Value::Object(Map::new()),
            data => data,
        };
        serde_json::from_value(data)
            .map_err(|e| BridgeError::UnexpectedPayload(format!("{}: {}", action, e)))
    }
}
