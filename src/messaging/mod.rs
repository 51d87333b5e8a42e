// Messaging - Lock-free queues between the control and sequencer threads

pub mod channels;
pub mod command;
pub mod event;

pub use channels::{
    CommandConsumer, CommandProducer, ControlConsumer, ControlProducer, EventConsumer,
    EventProducer, create_command_channel, create_control_channel, create_event_channel,
};
pub use command::Command;
pub use event::SequencerEvent;
