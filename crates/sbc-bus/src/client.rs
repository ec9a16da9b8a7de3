// SPDX-License-Identifier: MIT OR Apache-2.0
//! Client facade handing out compression-aware senders and receivers.

use crate::{
    BusClient, BusError, CompressionAwareReceiver, CompressionAwareSender, ReceiverOptions,
    SenderOptions,
};
use async_trait::async_trait;
use sbc_compress::{CompressionConfiguration, ConfigurationError};
use std::sync::Arc;
use tracing::info;

/// Wraps a [`BusClient`] so that every sender and receiver it creates
/// compresses and decompresses transparently.
///
/// All senders and receivers share one [`CompressionConfiguration`].
#[derive(Debug)]
pub struct CompressionAwareClient<C> {
    inner: C,
    config: Arc<CompressionConfiguration>,
}

impl<C: BusClient> CompressionAwareClient<C> {
    /// Wrap `inner` with an existing configuration.
    pub fn new(inner: C, config: Arc<CompressionConfiguration>) -> Self {
        info!(
            target: "sbc.bus",
            method = config.method_name(),
            minimum_size = config.minimum_size(),
            "compression-aware client created"
        );
        Self { inner, config }
    }

    /// Wrap `inner` with the gzip configuration at the given threshold.
    pub fn with_threshold(inner: C, minimum_size: usize) -> Result<Self, ConfigurationError> {
        let config = CompressionConfiguration::gzip(minimum_size)?;
        Ok(Self::new(inner, Arc::new(config)))
    }

    /// Start building a client around `inner`.
    pub fn builder(inner: C) -> CompressionAwareClientBuilder<C> {
        CompressionAwareClientBuilder {
            inner,
            config: None,
        }
    }

    /// The wrapped client.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// The shared configuration.
    pub fn configuration(&self) -> &Arc<CompressionConfiguration> {
        &self.config
    }
}

#[async_trait]
impl<C: BusClient> BusClient for CompressionAwareClient<C> {
    type Sender = CompressionAwareSender<C::Sender>;
    type Receiver = CompressionAwareReceiver<C::Receiver>;

    fn create_sender_with_options(
        &self,
        queue_or_topic: &str,
        options: SenderOptions,
    ) -> Result<Self::Sender, BusError> {
        let inner = self.inner.create_sender_with_options(queue_or_topic, options)?;
        Ok(CompressionAwareSender::new(inner, Arc::clone(&self.config)))
    }

    fn create_receiver_with_options(
        &self,
        queue: &str,
        options: ReceiverOptions,
    ) -> Result<Self::Receiver, BusError> {
        let inner = self.inner.create_receiver_with_options(queue, options)?;
        Ok(CompressionAwareReceiver::new(inner, Arc::clone(&self.config)))
    }

    fn create_subscription_receiver_with_options(
        &self,
        topic: &str,
        subscription: &str,
        options: ReceiverOptions,
    ) -> Result<Self::Receiver, BusError> {
        let inner = self
            .inner
            .create_subscription_receiver_with_options(topic, subscription, options)?;
        Ok(CompressionAwareReceiver::new(inner, Arc::clone(&self.config)))
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    async fn close(&self) -> Result<(), BusError> {
        self.inner.close().await
    }
}

/// Builder for [`CompressionAwareClient`].
#[derive(Debug)]
pub struct CompressionAwareClientBuilder<C> {
    inner: C,
    config: Option<Arc<CompressionConfiguration>>,
}

impl<C: BusClient> CompressionAwareClientBuilder<C> {
    /// Configuration shared by every sender and receiver.
    #[must_use]
    pub fn configuration(mut self, config: impl Into<Arc<CompressionConfiguration>>) -> Self {
        self.config = Some(config.into());
        self
    }

    /// Finish the client. Fails with [`ConfigurationError::Missing`] when no
    /// configuration was supplied.
    pub fn build(self) -> Result<CompressionAwareClient<C>, ConfigurationError> {
        let config = self.config.ok_or(ConfigurationError::Missing)?;
        Ok(CompressionAwareClient::new(self.inner, config))
    }
}
