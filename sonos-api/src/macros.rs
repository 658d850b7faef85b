//! Declarative definition of UPnP operations
//!
//! Every AVTransport and RenderingControl action addresses instance 0, so the
//! generated request struct always carries `instance_id` ahead of the
//! action-specific fields and `new` fills it in. ZoneGroupTopology actions have
//! no instance and are written out by hand.

/// Define an operation marker, its request struct and its `SonosOperation` impl.
///
/// ```rust,ignore
/// define_operation! {
///     /// Start playback
///     operation: Play,
///     action: "Play",
///     service: AVTransport,
///     request: { speed: String },
///     response: (),
///     payload: |req| argument("Speed", &req.speed),
///     parse: |_xml| Ok(()),
/// }
/// ```
///
/// The generated payload always begins with `<InstanceID>`.
macro_rules! define_operation {
    (
        $(#[$meta:meta])*
        operation: $op:ident,
        action: $action:literal,
        service: $service:ident,
        request: { $($field:ident: $field_type:ty),* $(,)? },
        response: $response:ty,
        payload: |$req:ident| $payload:expr,
        parse: |$xml:ident| $parse:expr $(,)?
    ) => {
        paste::paste! {
            #[derive(Debug, Clone, PartialEq)]
            pub struct [<$op Request>] {
                pub instance_id: u32,
                $(pub $field: $field_type,)*
            }

            impl [<$op Request>] {
                #[allow(clippy::new_without_default)]
                pub fn new($($field: $field_type),*) -> Self {
                    Self { instance_id: 0, $($field,)* }
                }
            }

            $(#[$meta])*
            pub struct $op;

            impl $crate::operation::SonosOperation for $op {
                type Request = [<$op Request>];
                type Response = $response;

                const SERVICE: $crate::service::Service = $crate::service::Service::$service;
                const ACTION: &'static str = $action;

                #[allow(unused_variables)]
                fn build_payload(request: &Self::Request) -> String {
                    let $req = request;
                    let args: String = $payload;
                    format!("<InstanceID>{}</InstanceID>{}", request.instance_id, args)
                }

                fn parse_response(xml: &xmltree::Element) -> $crate::error::Result<Self::Response> {
                    let $xml = xml;
                    $parse
                }
            }
        }
    };
}
