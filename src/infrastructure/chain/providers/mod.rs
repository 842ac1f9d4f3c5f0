pub mod node;

pub use node::NodeProvider;
