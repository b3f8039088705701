use super::*;

#[test]
fn endpoints_are_built_from_base_url() {
    assert_eq!(stop_endpoint("http://h:1"), "http://h:1/api/query/stop");
    assert_eq!(conversations_endpoint("http://h:1"), "http://h:1/api/conversations");
    assert_eq!(
        messages_endpoint("http://h:1", "c-7")
            .expect("url")
            .as_str(),
        "http://h:1/api/conversations/c-7/messages"
    );
}

#[test]
fn messages_endpoint_encodes_conversation_id() {
    let url = messages_endpoint("http://h:1", "a/b?c#d").expect("url");
    assert_eq!(url.as_str(), "http://h:1/api/conversations/a%2Fb%3Fc%23d/messages");
    assert_eq!(url.query(), None);
}

#[test]
fn messages_endpoint_rejects_unparseable_base_url() {
    assert!(matches!(messages_endpoint("not a url", "c-1"), Err(ClientError::InvalidBaseUrl(_))));
}

