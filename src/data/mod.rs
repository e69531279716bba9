mod types;

pub use types::{
    Author, Content, Conversation, Detail, ImagePart, Message, Metadata, Node, NodeMap, Part,
    Role, Thought,
};
