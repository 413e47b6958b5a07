use state_machines::state_machine;

state_machine! {
    name: IngestionMachine,
    state: IngestionState,
    initial: Ready,
    states: [Ready, Stored, Derived, Indexed],
    events {
        store { transition: { from: Ready, to: Stored } }
        derive { transition: { from: Stored, to: Derived } }
        index { transition: { from: Derived, to: Indexed } }
    }
}

pub fn ready() -> IngestionMachine<(), Ready> {
    IngestionMachine::new(())
}
