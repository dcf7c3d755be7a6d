//! Standard simulation events.

// VM LIFECYCLE EVENTS /////////////////////////////////////////////////////////////////////////////

pub mod vm {
    use serde::Serialize;

    use crate::core::vm::VmSpec;

    /// Broker asks the datacenter to place and start a new VM.
    #[derive(Clone, Serialize)]
    pub struct VmCreationRequest {
        pub spec: VmSpec,
    }

    /// No suitable host was found for the requested VM.
    #[derive(Clone, Serialize)]
    pub struct VmCreationFailed {
        pub vm_id: u32,
    }

    /// Broker asks the datacenter to shut a VM down.
    #[derive(Clone, Serialize)]
    pub struct VmDestructionRequest {
        pub vm_id: u32,
    }

    /// Datacenter self-event marking the end of the VM startup delay.
    #[derive(Clone, Serialize)]
    pub struct VmStarted {
        pub vm_id: u32,
    }

    /// Datacenter self-event marking the end of the VM shutdown delay.
    #[derive(Clone, Serialize)]
    pub struct VmStopped {
        pub vm_id: u32,
    }
}

// CLOUDLET EXECUTION EVENTS ///////////////////////////////////////////////////////////////////////

pub mod cloudlet {
    use serde::Serialize;

    use crate::core::cloudlet::Cloudlet;

    /// Broker hands a dispatched cloudlet over to the datacenter.
    #[derive(Clone, Serialize)]
    pub struct CloudletSubmit {
        pub cloudlet: Cloudlet,
    }

    /// Datacenter self-event marking the completion of an executing cloudlet.
    #[derive(Clone, Serialize)]
    pub struct CloudletCompletion {
        pub vm_id: u32,
        pub cloudlet_id: u32,
    }

    /// A finished cloudlet travels back to the broker.
    #[derive(Clone, Serialize)]
    pub struct CloudletReturned {
        pub cloudlet: Cloudlet,
    }

    /// A submission that reached a VM which is not running yet bounces back
    /// to the broker instead of being lost.
    #[derive(Clone, Serialize)]
    pub struct CloudletBounced {
        pub cloudlet: Cloudlet,
    }

    /// Cloudlets harvested from a destroyed VM, to be reset and re-queued.
    #[derive(Clone, Serialize)]
    pub struct CloudletsHarvested {
        pub vm_id: u32,
        pub cloudlets: Vec<Cloudlet>,
    }
}

// DRIVER EVENTS ///////////////////////////////////////////////////////////////////////////////////

pub mod control {
    use serde::Serialize;

    /// Payload-free event injected by the driver to keep the simulation
    /// alive while cloudlets are still in flight.
    #[derive(Clone, Serialize)]
    pub struct KeepAlive {}
}
