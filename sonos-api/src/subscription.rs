//! GENA subscription lifecycle
//!
//! A speaker pushes state changes to a callback URL for as long as the
//! subscription is renewed. Renewal at half the granted timeout leaves a full
//! half-period of slack for a slow or failed attempt.

use soap_client::SoapClient;
use std::time::Duration;

use crate::error::Result;
use crate::service::Service;

/// An active subscription to one service on one speaker
#[derive(Debug, Clone)]
pub struct Subscription {
    sid: String,
    host: String,
    service: Service,
    timeout_seconds: u32,
    soap_client: SoapClient,
}

impl Subscription {
    /// Send SUBSCRIBE and wrap the granted SID.
    ///
    /// # Arguments
    /// * `host` - Speaker address as `ip:port`
    /// * `callback_url` - Where the speaker should NOTIFY
    /// * `timeout_seconds` - Requested lifetime; the speaker may grant less
    pub fn create(
        soap_client: SoapClient,
        host: &str,
        service: Service,
        callback_url: &str,
        timeout_seconds: u32,
    ) -> Result<Self> {
        let response = soap_client.subscribe(
            host,
            service.info().event_endpoint,
            callback_url,
            timeout_seconds,
        )?;

        Ok(Self {
            sid: response.sid,
            host: host.to_string(),
            service,
            timeout_seconds: response.timeout_seconds,
            soap_client,
        })
    }

    pub fn sid(&self) -> &str {
        &self.sid
    }

    pub fn service(&self) -> Service {
        self.service
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// How long to wait before the next renewal
    pub fn renewal_interval(&self) -> Duration {
        Duration::from_secs(u64::from((self.timeout_seconds / 2).max(1)))
    }

    /// Renew for another period of the last granted timeout
    pub fn renew(&mut self) -> Result<()> {
        self.timeout_seconds = self.soap_client.renew(
            &self.host,
            self.service.info().event_endpoint,
            &self.sid,
            self.timeout_seconds,
        )?;
        Ok(())
    }

    pub fn unsubscribe(&self) -> Result<()> {
        self.soap_client
            .unsubscribe(&self.host, self.service.info().event_endpoint, &self.sid)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    #[test]
    fn test_lifecycle_against_mock_speaker() {
        let mut server = mockito::Server::new();
        let subscribe = server
            .mock("SUBSCRIBE", "/MediaRenderer/RenderingControl/Event")
            .match_header("callback", "<http://10.0.0.5:3500/>")
            .with_status(200)
            .with_header("SID", "uuid:sub-1")
            .with_header("TIMEOUT", "Second-120")
            .create();

        let mut subscription = Subscription::create(
            SoapClient::new(),
            &server.host_with_port(),
            Service::RenderingControl,
            "http://10.0.0.5:3500/",
            3600,
        )
        .unwrap();
        subscribe.assert();

        assert_eq!(subscription.sid(), "uuid:sub-1");
        assert_eq!(subscription.renewal_interval(), Duration::from_secs(60));

        let renew = server
            .mock("SUBSCRIBE", "/MediaRenderer/RenderingControl/Event")
            .match_header("sid", "uuid:sub-1")
            .with_status(200)
            .with_header("TIMEOUT", "Second-30")
            .create();
        subscription.renew().unwrap();
        renew.assert();
        assert_eq!(subscription.renewal_interval(), Duration::from_secs(15));

        let unsubscribe = server
            .mock("UNSUBSCRIBE", "/MediaRenderer/RenderingControl/Event")
            .match_header("sid", "uuid:sub-1")
            .with_status(200)
            .create();
        subscription.unsubscribe().unwrap();
        unsubscribe.assert();
    }

    #[test]
    fn test_rejected_subscribe_is_a_subscription_error() {
        let mut server = mockito::Server::new();
        server
            .mock("SUBSCRIBE", "/MediaRenderer/AVTransport/Event")
            .with_status(503)
            .create();

        let result = Subscription::create(
            SoapClient::new(),
            &server.host_with_port(),
            Service::AVTransport,
            "http://10.0.0.5:3500/",
            3600,
        );
        assert!(matches!(result, Err(ApiError::SubscriptionError(_))));
    }
}
