//! Preconditions: operations outside their required state, role, or protocol
//! version fail and leave the exchange untouched.

mod utils;

use rstest::rstest;
use vc_exchange::dispatch::InboundMessage;
use vc_exchange::exchange::{Exchange, ProtocolVersion, Role, State};
use vc_exchange::message::{Codec, Header, Message, OfferDetails};
use vc_exchange::provider::ConnectionState;
use vc_exchange::service::{AcceptOfferOptions, AcceptRequestOptions, DeclineOptions, OfferOptions};
use vc_exchange::{Error, V1, V2};

use crate::utils::agent::{CONNECTION_ID, HOLDER_DID, ISSUER_DID};
use crate::utils::agent::ledger::CRED_DEF_ID;
use crate::utils::agent::store;
use crate::utils::{Parties, attributes, parties};

// Offer a credential and deliver it, returning the issuer's and the holder's
// records.
async fn offered<C: Codec>(parties: &Parties) -> (Exchange, Exchange) {
    let details = OfferDetails {
        attributes: attributes(),
        ..OfferDetails::default()
    };
    let options = OfferOptions::new(CRED_DEF_ID, details).connection(CONNECTION_ID);
    let (message, offered) =
        parties.issuer.service::<C>().create_offer(options).await.expect("should offer");

    let inbound = InboundMessage::new(message, Some(parties.holder.provider().connection()));
    let received =
        parties.holder.service::<C>().process_offer(&inbound).await.expect("should process offer");
    (offered, received)
}

#[rstest]
#[tokio::test]
async fn state_guard(parties: Parties) {
    utils::init_tracer();

    let (_, received) = offered::<V1>(&parties).await;
    let holder = parties.holder.service::<V1>();
    let published = parties.holder.provider().events().published();

    let Err(e) = holder.create_ack(&received.id).await else {
        panic!("ack before the credential should fail");
    };
    let Error::InvalidState {
        exchange_id,
        current,
        expected,
    } = e
    else {
        panic!("expected InvalidState");
    };
    assert_eq!(exchange_id, received.id);
    assert_eq!(current, State::OfferReceived);
    assert_eq!(expected, vec![State::CredentialReceived]);

    // unchanged, and nothing announced
    assert_eq!(holder.exchange(&received.id).await.expect("should exist"), received);
    assert_eq!(parties.holder.provider().events().published(), published);
}

#[rstest]
#[tokio::test]
async fn ack_twice(parties: Parties) {
    utils::init_tracer();

    let (offered, received) = offered::<V2>(&parties).await;
    let holder = parties.holder.service::<V2>();
    let issuer = parties.issuer.service::<V2>();

    let request = holder
        .create_request(AcceptOfferOptions::new(&received.id))
        .await
        .expect("should request");
    issuer
        .process_request(&InboundMessage::new(request, Some(parties.issuer.provider().connection())))
        .await
        .expect("should process request");
    let credential = issuer
        .create_credential(AcceptRequestOptions::new(&offered.id))
        .await
        .expect("should issue");
    holder
        .process_issue(&InboundMessage::new(
            credential,
            Some(parties.holder.provider().connection()),
        ))
        .await
        .expect("should process credential");

    holder.create_ack(&received.id).await.expect("should ack");
    let done = holder.exchange(&received.id).await.expect("should exist");
    let published = parties.holder.provider().events().published();

    let Err(e) = holder.create_ack(&received.id).await else {
        panic!("second ack should fail");
    };
    assert!(matches!(e, Error::InvalidState { current: State::Done, .. }));
    assert_eq!(holder.exchange(&received.id).await.expect("should exist"), done);
    assert_eq!(parties.holder.provider().events().published(), published);
}

#[rstest]
#[tokio::test]
async fn version_guard(parties: Parties) {
    utils::init_tracer();

    let (_, received) = offered::<V1>(&parties).await;

    let holder = parties.holder.service::<V2>();
    let Err(e) = holder.create_request(AcceptOfferOptions::new(&received.id)).await else {
        panic!("a 2.0 request on a 1.0 exchange should fail");
    };
    assert!(matches!(
        e,
        Error::ProtocolVersionMismatch {
            current: ProtocolVersion::V1,
            expected: ProtocolVersion::V2,
            ..
        }
    ));
    assert!(e.is_precondition());
}

#[rstest]
#[tokio::test]
async fn role_guard(parties: Parties) {
    utils::init_tracer();

    let (offered, _) = offered::<V1>(&parties).await;
    let issuer = parties.issuer.service::<V1>();

    let Err(e) = issuer.create_request(AcceptOfferOptions::new(&offered.id)).await else {
        panic!("an issuer cannot request");
    };
    assert!(matches!(
        e,
        Error::InvalidRole {
            current: Role::Issuer,
            expected: Role::Holder,
            ..
        }
    ));
    assert_eq!(issuer.exchange(&offered.id).await.expect("should exist"), offered);
}

// The offer's formats do not advertise its attachment.
#[rstest]
#[tokio::test]
async fn format_missing(parties: Parties) {
    utils::init_tracer();

    let details = OfferDetails::default();
    let Message::OfferV2(mut offer) = V2::offer(Header::opening("thread-1"), "{}", &details) else {
        panic!("should build a 2.0 offer");
    };
    offer.formats.clear();

    let inbound =
        InboundMessage::new(Message::OfferV2(offer), Some(parties.holder.provider().connection()));
    let Err(e) = parties.holder.service::<V2>().process_offer(&inbound).await else {
        panic!("offer without formats should fail");
    };
    assert!(matches!(e, Error::FormatMissing(_)));

    assert!(parties.holder.provider().records().is_empty());
    assert_eq!(parties.holder.provider().events().published(), 0);
}

#[rstest]
#[tokio::test]
async fn attachment_missing(parties: Parties) {
    utils::init_tracer();

    let details = OfferDetails::default();
    let Message::OfferV1(mut offer) = V1::offer(Header::opening("thread-1"), "{}", &details) else {
        panic!("should build a 1.0 offer");
    };
    offer.offers.clear();

    let inbound =
        InboundMessage::new(Message::OfferV1(offer), Some(parties.holder.provider().connection()));
    let Err(e) = parties.holder.service::<V1>().process_offer(&inbound).await else {
        panic!("offer without attachment should fail");
    };
    assert!(matches!(e, Error::AttachmentMissing(_)));
    assert!(parties.holder.provider().records().is_empty());
}

#[rstest]
#[tokio::test]
async fn incomplete_connection(parties: Parties) {
    utils::init_tracer();

    let details = OfferOptions::new(CRED_DEF_ID, OfferDetails::default());
    let (message, _) =
        parties.issuer.service::<V1>().create_offer(details).await.expect("should offer");

    let mut connection = store::complete("connection-2", "did:sov:holder", "did:sov:issuer");
    connection.state = ConnectionState::Requested;
    let inbound = InboundMessage::new(message, Some(connection));

    let Err(e) = parties.holder.service::<V1>().process_offer(&inbound).await else {
        panic!("offer over an incomplete connection should fail");
    };
    assert!(matches!(e, Error::InvalidMessage(_)));
    assert!(parties.holder.provider().records().is_empty());
}

// A failing collaborator leaves the record as it was.
#[rstest]
#[tokio::test]
async fn collaborator_failure(parties: Parties) {
    utils::init_tracer();

    let (_, received) = offered::<V2>(&parties).await;
    let holder = parties.holder.service::<V2>();
    let published = parties.holder.provider().events().published();

    parties.holder.provider().anoncreds().fail(true);
    let Err(e) = holder.create_request(AcceptOfferOptions::new(&received.id)).await else {
        panic!("request should fail");
    };
    assert!(matches!(e, Error::External(_)));
    assert_eq!(e.to_string(), "anoncreds unavailable");

    let unchanged = holder.exchange(&received.id).await.expect("should exist");
    assert_eq!(unchanged, received);
    assert!(unchanged.request_metadata.is_none());
    assert_eq!(parties.holder.provider().events().published(), published);

    // and the operation succeeds once the collaborator recovers
    parties.holder.provider().anoncreds().fail(false);
    holder.create_request(AcceptOfferOptions::new(&received.id)).await.expect("should request");
    let requested = holder.exchange(&received.id).await.expect("should exist");
    assert_eq!(requested.state, State::RequestSent);
}

#[rstest]
#[tokio::test]
async fn unknown_record(parties: Parties) {
    utils::init_tracer();

    let Err(e) = parties.holder.service::<V1>().create_ack("no-such-exchange").await else {
        panic!("unknown record should fail");
    };
    assert!(matches!(e, Error::NotFound(_)));

    // a credential on a thread the holder never joined
    let offer = V1::offer(Header::opening("thread-1"), "{}", &OfferDetails::default());
    let payload = r#"{"schema_id":"s","cred_def_id":"c"}"#;
    let credential = V1::issue(Header::reply("thread-1"), payload, None, &offer);
    let inbound = InboundMessage::new(credential, Some(parties.holder.provider().connection()));
    let Err(e) = parties.holder.service::<V1>().process_issue(&inbound).await else {
        panic!("credential without an exchange should fail");
    };
    assert!(matches!(e, Error::NotFound(_)));
}

#[rstest]
#[tokio::test]
async fn decline_offer(parties: Parties) {
    utils::init_tracer();

    let (offered, received) = offered::<V1>(&parties).await;
    let holder = parties.holder.v1();

    let options = DeclineOptions {
        exchange_id: received.id.clone(),
        reason: Some("not needed".into()),
    };
    let declined = holder.decline_offer(options).await.expect("should decline");
    assert_eq!(declined.state, State::Declined);
    assert_eq!(declined.error_message.as_deref(), Some("not needed"));

    // declined is final
    let Err(e) = holder.accept_offer(AcceptOfferOptions::new(&received.id)).await else {
        panic!("a declined offer cannot be accepted");
    };
    assert!(matches!(e, Error::InvalidState { current: State::Declined, .. }));

    // the issuer learns of it
    parties.to_issuer().await.expect("should process problem report");
    let record = parties.issuer.v1().exchange(&offered.id).await.expect("should exist");
    assert_eq!(record.state, State::Declined);
    assert_eq!(record.error_message.as_deref(), Some("not needed"));
}

// An offer bound to one connection is not answered over another.
#[rstest]
#[tokio::test]
async fn request_on_other_connection(parties: Parties) {
    utils::init_tracer();

    let (offered, received) = offered::<V1>(&parties).await;
    let request = parties
        .holder
        .service::<V1>()
        .create_request(AcceptOfferOptions::new(&received.id))
        .await
        .expect("should request");

    let issuer = parties.issuer.service::<V1>();
    let other = store::complete("connection-2", ISSUER_DID, HOLDER_DID);
    let inbound = InboundMessage::new(request.clone(), Some(other));
    let Err(e) = issuer.process_request(&inbound).await else {
        panic!("request over another connection should fail");
    };
    assert!(matches!(e, Error::InvalidMessage(_)));

    let unchanged = issuer.exchange(&offered.id).await.expect("should exist");
    assert_eq!(unchanged, offered);
    assert_eq!(unchanged.connection_id, CONNECTION_ID);
    assert_eq!(parties.issuer.provider().records().len(), 1);

    // the offer's own connection still works
    let inbound = InboundMessage::new(request, Some(parties.issuer.provider().connection()));
    let requested = issuer.process_request(&inbound).await.expect("should process request");
    assert_eq!(requested.id, offered.id);
    assert_eq!(requested.state, State::RequestReceived);
}

// A holder declining a connection-less offer declines the issuer's record.
#[rstest]
#[tokio::test]
async fn decline_connectionless_offer(parties: Parties) {
    utils::init_tracer();

    let issuer = parties.issuer.service::<V2>();
    let holder = parties.holder.service::<V2>();

    let details = OfferDetails {
        attributes: attributes(),
        ..OfferDetails::default()
    };
    let (offer, offered) =
        issuer.create_offer(OfferOptions::new(CRED_DEF_ID, details)).await.expect("should offer");
    assert_eq!(offered.connection_id, parties.issuer.config().connectionless_id);

    let inbound = InboundMessage::new(offer, Some(parties.holder.provider().connection()));
    let received = holder.process_offer(&inbound).await.expect("should process offer");
    let options = DeclineOptions {
        exchange_id: received.id,
        reason: Some("not needed".into()),
    };
    let report = holder.create_decline(options).await.expect("should decline");

    let inbound = InboundMessage::new(report, Some(parties.issuer.provider().connection()));
    let declined = issuer.process_problem_report(&inbound).await.expect("should process report");
    assert_eq!(declined.id, offered.id);
    assert_eq!(declined.state, State::Declined);
    assert_eq!(declined.error_message.as_deref(), Some("not needed"));
}
