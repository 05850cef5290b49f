//! Integration tests for end-to-end command handling.
//!
//! Drives the server over TCP the way a client does: lines are framed with
//! `ClientSession`, replies are compared against the exact text or JSON the
//! server should produce.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chatty_proto::chat::ChatKind;
use chatty_proto::codec;
use chatty_proto::dto::{
    ChatMessage, GroupChatDto, Notification, NotificationKind, PersonalChatDto, SessionDto,
    UserDto,
};
use chatty_proto::session::ClientSession;
use chatty_server::executor::{CommandExecutor, HELP_TEXT, INCORRECT_FORMAT, UNKNOWN_COMMAND};
use chatty_server::notifications::NotificationStore;
use chatty_server::server::{self, ServerHandle, ServerOptions};
use chatty_server::service::{MemoryBackend, Services};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const TIMEOUT: Duration = Duration::from_secs(5);

/// A connected client with its own session state.
struct Client {
    stream: TcpStream,
    session: ClientSession,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = tokio::time::timeout(TIMEOUT, TcpStream::connect(addr))
            .await
            .expect("connect timed out")
            .unwrap();
        Self {
            stream,
            session: ClientSession::new(),
        }
    }

    /// Frames `input`, sends it, and checks the reply.
    async fn expect(&mut self, input: &str, expected: &str) {
        let line = self.session.frame(input);
        self.stream.write_all(line.as_bytes()).await.unwrap();
        let mut buf = vec![0u8; expected.len()];
        tokio::time::timeout(TIMEOUT, self.stream.read_exact(&mut buf))
            .await
            .expect("reply timed out")
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&buf), expected, "reply to {line:?}");
    }

    async fn expect_json<T: serde::Serialize>(&mut self, input: &str, expected: &T) {
        self.expect(input, &codec::encode(expected).unwrap()).await;
    }

    async fn register_and_login(&mut self, first: &str, last: &str, username: &str) {
        self.expect(
            &format!("register {first} {last} {username} Passw0rdX"),
            "Successful registration",
        )
        .await;
        let session = SessionDto {
            user: UserDto::new(format!("{first} {last}"), username),
            notifications: Vec::new(),
        };
        self.expect_json(&format!("login {username} Passw0rdX"), &session)
            .await;
        self.session.log_in(username);
    }
}

async fn start() -> (SocketAddr, ServerHandle) {
    start_with(MemoryBackend::new()).await
}

async fn start_with(backend: MemoryBackend) -> (SocketAddr, ServerHandle) {
    let executor = CommandExecutor::new(Services::in_memory(Arc::new(backend)));
    server::start_server("127.0.0.1:0", executor, ServerOptions::default())
        .await
        .expect("failed to start server")
}

// =============================================================================
// Accounts
// =============================================================================

#[tokio::test]
async fn register_login_logout() {
    let (addr, handle) = start().await;
    let mut alice = Client::connect(addr).await;

    alice.register_and_login("Alice", "Smith", "alice").await;
    alice
        .expect("register Alice Smith alice Passw0rdX", INCORRECT_FORMAT)
        .await;
    alice.expect("logout", "Logged out").await;
    alice.session.log_out();

    alice
        .expect("register Alice Smith alice Passw0rdX", "User already exists")
        .await;
    alice
        .expect("login alice WrongPass1", "Invalid username or password")
        .await;
    handle.stop();
}

#[tokio::test]
async fn weak_password_is_rejected() {
    let (addr, handle) = start().await;
    let mut client = Client::connect(addr).await;
    client
        .expect(
            "register Alice Smith alice password",
            "Password must be at least 8 characters, 1 upper, 1 lower and 1 digit",
        )
        .await;
    handle.stop();
}

// =============================================================================
// Friends
// =============================================================================

#[tokio::test]
async fn friend_request_accept_and_chat() {
    let (addr, handle) = start().await;
    let mut alice = Client::connect(addr).await;
    let mut bob = Client::connect(addr).await;
    alice.register_and_login("Alice", "Smith", "alice").await;
    bob.register_and_login("Bob", "Jones", "bob").await;

    alice.expect("add-friend bob", "Friend request sent to bob").await;
    alice
        .expect("add-friend bob", "You have already sent friend request to bob")
        .await;
    bob.expect_json("check-requests", &[UserDto::new("Alice Smith", "alice")])
        .await;
    bob.expect("accept alice", "You are now friends with alice").await;
    bob.expect("check-requests", "You have no requests at this moment")
        .await;

    alice
        .expect_json("list-friends", &[UserDto::new("Bob Jones", "bob")])
        .await;

    alice
        .expect_json(
            "open-chat bob",
            &PersonalChatDto {
                friend: "bob".into(),
                messages: Vec::new(),
            },
        )
        .await;
    alice.session.enter_chat(ChatKind::Personal, "bob");
    alice.expect("send \"hi bob\"", "[alice] hi bob").await;
    alice.expect("close-chat", "closed").await;
    alice.session.leave_chat();

    bob.expect_json(
        "open-chat alice",
        &PersonalChatDto {
            friend: "alice".into(),
            messages: vec![ChatMessage::new("alice", "hi bob")],
        },
    )
    .await;
    handle.stop();
}

#[tokio::test]
async fn add_friend_unknown_user() {
    let (addr, handle) = start().await;
    let mut alice = Client::connect(addr).await;
    alice.register_and_login("Alice", "Smith", "alice").await;

    alice.expect("add-friend ghost", "No such user exists").await;
    alice.expect("add-friend alice", "You cannot befriend yourself").await;
    handle.stop();
}

#[tokio::test]
async fn decline_remove_and_empty_lists() {
    let (addr, handle) = start().await;
    let mut alice = Client::connect(addr).await;
    let mut bob = Client::connect(addr).await;
    alice.register_and_login("Alice", "Smith", "alice").await;
    bob.register_and_login("Bob", "Jones", "bob").await;

    alice.expect("add-friend bob", "Friend request sent to bob").await;
    bob.expect("decline alice", "Request declined").await;
    alice
        .expect("list-friends", "You have no friends at this moment")
        .await;

    alice.expect("add-friend bob", "Friend request sent to bob").await;
    bob.expect("accept alice", "You are now friends with alice").await;
    alice.expect("remove-friend bob", "Friend removed successfully").await;
    bob.expect("remove-friend alice", "Friendship between users does not exist.")
        .await;
    handle.stop();
}

#[tokio::test]
async fn block_and_unblock() {
    let (addr, handle) = start().await;
    let mut alice = Client::connect(addr).await;
    let mut bob = Client::connect(addr).await;
    alice.register_and_login("Alice", "Smith", "alice").await;
    bob.register_and_login("Bob", "Jones", "bob").await;

    alice.expect("list-blocked", "You have not blocked anyone").await;
    alice.expect("block bob", "bob blocked").await;
    alice
        .expect_json("list-blocked", &[UserDto::new("Bob Jones", "bob")])
        .await;
    bob.expect("add-friend alice", "Sender blocked by target user")
        .await;

    alice.expect("unblock bob", "bob unblocked").await;
    alice.expect("unblock bob", "bob is not blocked").await;
    handle.stop();
}

// =============================================================================
// Notifications
// =============================================================================

#[tokio::test]
async fn inbox_is_delivered_once() {
    let (addr, handle) = start().await;
    let mut alice = Client::connect(addr).await;
    let mut bob = Client::connect(addr).await;
    alice.register_and_login("Alice", "Smith", "alice").await;
    bob.register_and_login("Bob", "Jones", "bob").await;

    alice.expect("add-friend bob", "Friend request sent to bob").await;
    bob.expect("accept alice", "You are now friends with alice").await;

    alice.session.enter_chat(ChatKind::Personal, "bob");
    alice.expect("send \"are you there?\"", "[alice] are you there?").await;

    bob.expect_json(
        "check-inbox",
        &[
            Notification::new(NotificationKind::FriendRequest, "From Alice Smith [alice]"),
            Notification::new(NotificationKind::PersonalMessage, "[alice] are you there?"),
        ],
    )
    .await;
    bob.expect("check-inbox", "[]").await;

    alice
        .expect_json(
            "check-inbox",
            &[Notification::new(
                NotificationKind::Other,
                "Bob Jones accepted your friend request",
            )],
        )
        .await;
    handle.stop();
}

#[tokio::test]
async fn login_returns_and_clears_pending_notifications() {
    let (addr, handle) = start().await;
    let mut alice = Client::connect(addr).await;
    let mut bob = Client::connect(addr).await;
    alice.register_and_login("Alice", "Smith", "alice").await;
    bob.expect("register Bob Jones bob Passw0rdX", "Successful registration")
        .await;

    alice.expect("add-friend bob", "Friend request sent to bob").await;

    let session = SessionDto {
        user: UserDto::new("Bob Jones", "bob"),
        notifications: vec![Notification::new(
            NotificationKind::FriendRequest,
            "From Alice Smith [alice]",
        )],
    };
    bob.expect_json("login bob Passw0rdX", &session).await;
    bob.session.log_in("bob");
    bob.expect("check-inbox", "[]").await;
    handle.stop();
}

#[tokio::test]
async fn notification_queue_is_capped() {
    let backend =
        MemoryBackend::with_notifications(NotificationStore::with_max_queue_size(1));
    let (addr, handle) = start_with(backend).await;
    let mut alice = Client::connect(addr).await;
    let mut bob = Client::connect(addr).await;
    alice.register_and_login("Alice", "Smith", "alice").await;
    bob.register_and_login("Bob", "Jones", "bob").await;

    alice.expect("add-friend bob", "Friend request sent to bob").await;
    alice.expect("block bob", "bob blocked").await;

    bob.expect_json(
        "check-inbox",
        &[Notification::new(NotificationKind::Other, "Alice Smith blocked you")],
    )
    .await;
    handle.stop();
}

// =============================================================================
// Groups
// =============================================================================

#[tokio::test]
async fn group_lifecycle() {
    let (addr, handle) = start().await;
    let mut alice = Client::connect(addr).await;
    let mut bob = Client::connect(addr).await;
    alice.register_and_login("Alice", "Smith", "alice").await;
    bob.register_and_login("Bob", "Jones", "bob").await;

    alice.expect("list-groups", "You are not in any group").await;
    alice
        .expect("create-group Team", "Group chat created with admin alice")
        .await;
    alice.expect("add-to-group bob Team", "bob added to Team").await;
    bob.expect("add-to-group alice Team", "You do not have permissions to manage Team")
        .await;
    bob.expect_json("list-groups", &["Team"]).await;

    bob.expect_json(
        "open-group Team",
        &GroupChatDto {
            name: "Team".into(),
            users: vec!["alice".into(), "bob".into()],
            messages: Vec::new(),
        },
    )
    .await;
    bob.session.enter_chat(ChatKind::Group, "Team");
    bob.expect("send \"hello team\"", "[bob] hello team").await;

    alice
        .expect("remove-from-group bob Team", "bob kicked from Team")
        .await;
    bob.expect("send \"still here?\"", "Group chat does not exist")
        .await;

    alice.expect("leave Team", "You left Team").await;
    alice.expect("delete-group Team", "Group chat does not exist").await;
    handle.stop();
}

#[tokio::test]
async fn only_admin_deletes_group() {
    let (addr, handle) = start().await;
    let mut alice = Client::connect(addr).await;
    let mut bob = Client::connect(addr).await;
    alice.register_and_login("Alice", "Smith", "alice").await;
    bob.register_and_login("Bob", "Jones", "bob").await;

    alice
        .expect("create-group Team", "Group chat created with admin alice")
        .await;
    bob.expect("delete-group Team", "You do not have permissions to delete Team")
        .await;
    alice.expect("delete-group Team", "Group chat deleted").await;
    handle.stop();
}

// =============================================================================
// Protocol errors
// =============================================================================

#[tokio::test]
async fn bad_input_gets_fixed_replies() {
    let (addr, handle) = start().await;
    let mut client = Client::connect(addr).await;

    client.expect("fly away", UNKNOWN_COMMAND).await;
    client.expect("help", HELP_TEXT).await;
    client.expect("login onlyname", INCORRECT_FORMAT).await;
    client.expect("send \"no chat\" alice none 3", INCORRECT_FORMAT).await;
    client.expect("send \"a\" \"b\" alice bob 1", INCORRECT_FORMAT).await;
    client.expect("logout", "Logged out").await;
    handle.stop();
}

#[tokio::test]
async fn send_outside_chat_via_session() {
    let (addr, handle) = start().await;
    let mut alice = Client::connect(addr).await;
    alice.register_and_login("Alice", "Smith", "alice").await;

    alice.expect("send \"into the void\"", INCORRECT_FORMAT).await;
    alice.expect("close-chat", "closed").await;
    handle.stop();
}
