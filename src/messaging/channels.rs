// Communication channels lock-free
// Control surface -> control thread -> sequencer thread, and events back

use crate::messaging::command::Command;
use crate::messaging::event::SequencerEvent;
use crate::midi::input::ControlMessage;
use ringbuf::{HeapRb, traits::Split};

pub type CommandProducer = ringbuf::HeapProd<Command>;
pub type CommandConsumer = ringbuf::HeapCons<Command>;

pub fn create_command_channel(capacity: usize) -> (CommandProducer, CommandConsumer) {
    let rb = HeapRb::<Command>::new(capacity.max(1));
    rb.split()
}

pub type EventProducer = ringbuf::HeapProd<SequencerEvent>;
pub type EventConsumer = ringbuf::HeapCons<SequencerEvent>;

pub fn create_event_channel(capacity: usize) -> (EventProducer, EventConsumer) {
    let rb = HeapRb::<SequencerEvent>::new(capacity.max(1));
    rb.split()
}

pub type ControlProducer = ringbuf::HeapProd<ControlMessage>;
pub type ControlConsumer = ringbuf::HeapCons<ControlMessage>;

pub fn create_control_channel(capacity: usize) -> (ControlProducer, ControlConsumer) {
    let rb = HeapRb::<ControlMessage>::new(capacity.max(1));
    rb.split()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::{Consumer, Producer};

    #[test]
    fn test_command_channel_is_bounded() {
        let (mut tx, mut rx) = create_command_channel(2);
        assert!(tx.try_push(Command::Start).is_ok());
        assert!(tx.try_push(Command::Stop).is_ok());
        assert!(tx.try_push(Command::Start).is_err());

        assert!(matches!(rx.try_pop(), Some(Command::Start)));
        assert!(matches!(rx.try_pop(), Some(Command::Stop)));
        assert!(rx.try_pop().is_none());
    }

    #[test]
    fn test_event_channel_preserves_order() {
        let (mut tx, mut rx) = create_event_channel(8);
        tx.try_push(SequencerEvent::Started).unwrap();
        tx.try_push(SequencerEvent::Beat(24)).unwrap();
        assert_eq!(rx.try_pop(), Some(SequencerEvent::Started));
        assert_eq!(rx.try_pop(), Some(SequencerEvent::Beat(24)));
    }
}
