//! The hello service's handlers.

use serde_json::json;

use super::registry::{HandlerError, HandlerRegistry, RequestHandler};
use crate::protocol::{Fields, Request};

/// Display name of the hello worker.
pub const HELLO_SERVICE_NAME: &str = "HelloService";

const HELLO_FORM_HTML: &str = concat!(
    r#"<form class="helloForm">Name: <input id="hello__service-name" type="text" name="name" />"#,
    r#"  <input type="button" value="Submit" onclick="helloService_sayHello()" />"#,
    r#"</form>"#,
    r#"<div>Response: <span id="hello__service-sayHello"></span></div>"#,
);

const HELLO_FORM_SCRIPT: &str = concat!(
    "function helloService_sayHello() { ",
    "var xhttp = new XMLHttpRequest();",
    "xhttp.open('POST', relaycoreURL + \"/services\", true);",
    "xhttp.setRequestHeader('Content-type', 'application/json');",
    "xhttp.onload = function() {",
    "if (this.readyState == 4 && this.status == 200) {",
    "var responseJSON = JSON.parse(xhttp.responseText);",
    "document.getElementById(\"hello__service-sayHello\").innerHTML = responseJSON.response;",
    "}",
    "};",
    "var name = document.getElementById(\"hello__service-name\").value;",
    "xhttp.send(JSON.stringify({requestType: \"sayHello\", name: name}));",
    "}",
);

/// `sayHello`: greets `name`.
pub struct SayHello;

impl RequestHandler for SayHello {
    fn request_type(&self) -> &str {
        "sayHello"
    }

    fn handle(&self, request: &Request) -> Result<Fields, HandlerError> {
        let name = request.field("name").ok_or(HandlerError::MissingField("name"))?;
        let mut body = Fields::new();
        body.insert("response".into(), json!(format!("Hello {}", name)));
        Ok(body)
    }

    fn describe(&self, request: &Request) -> Option<String> {
        request.field("name").map(str::to_string)
    }

    fn summarize(&self, body: &Fields) -> Option<String> {
        body.get("response")
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}

/// `sendHTML`: returns the browser form for `sayHello`.
pub struct SendHtml;

impl RequestHandler for SendHtml {
    fn request_type(&self) -> &str {
        "sendHTML"
    }

    fn handle(&self, _request: &Request) -> Result<Fields, HandlerError> {
        let mut body = Fields::new();
        body.insert("html".into(), json!(HELLO_FORM_HTML));
        body.insert("script".into(), json!(HELLO_FORM_SCRIPT));
        Ok(body)
    }
}

pub fn hello_registry() -> HandlerRegistry {
    HandlerRegistry::new().with(SayHello).with(SendHtml)
}
