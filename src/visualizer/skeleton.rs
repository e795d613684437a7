// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Bone topologies: which landmark indices are joined by a drawn line.
//!
//! Topologies are process-wide constants fixed by the model family, never
//! derived from a particular detection.

/// A fixed landmark layout and its bone connections.
#[derive(Debug, PartialEq, Eq)]
pub struct Topology {
    /// Short identifier used in logs.
    pub name: &'static str,
    /// Number of landmarks a detection carries.
    pub num_landmarks: usize,
    /// Pairs of landmark indices to connect.
    pub connections: &'static [[usize; 2]],
}

impl Topology {
    /// Number of bones.
    #[must_use]
    pub const fn num_connections(&self) -> usize {
        self.connections.len()
    }
}

/// BlazePose 33-landmark body topology.
///
/// Index 0 is the nose; 11/12 shoulders, 23/24 hips, 27/28 ankles.
pub const BLAZEPOSE: Topology = Topology {
    name: "blazepose",
    num_landmarks: 33,
    connections: &BLAZEPOSE_CONNECTIONS,
};

/// BlazePose bone connections.
pub const BLAZEPOSE_CONNECTIONS: [[usize; 2]; 35] = [
    [0, 1],   // nose to left eye (inner)
    [1, 2],   // left eye inner to left eye
    [2, 3],   // left eye to left eye (outer)
    [3, 7],   // left eye outer to left ear
    [0, 4],   // nose to right eye (inner)
    [4, 5],   // right eye inner to right eye
    [5, 6],   // right eye to right eye (outer)
    [6, 8],   // right eye outer to right ear
    [9, 10],  // mouth left to mouth right
    [11, 12], // left shoulder to right shoulder
    [11, 13], // left shoulder to left elbow
    [13, 15], // left elbow to left wrist
    [15, 17], // left wrist to left pinky
    [15, 19], // left wrist to left index
    [15, 21], // left wrist to left thumb
    [17, 19], // left pinky to left index
    [12, 14], // right shoulder to right elbow
    [14, 16], // right elbow to right wrist
    [16, 18], // right wrist to right pinky
    [16, 20], // right wrist to right index
    [16, 22], // right wrist to right thumb
    [18, 20], // right pinky to right index
    [11, 23], // left shoulder to left hip
    [12, 24], // right shoulder to right hip
    [23, 24], // left hip to right hip
    [23, 25], // left hip to left knee
    [24, 26], // right hip to right knee
    [25, 27], // left knee to left ankle
    [26, 28], // right knee to right ankle
    [27, 29], // left ankle to left heel
    [28, 30], // right ankle to right heel
    [29, 31], // left heel to left foot index
    [30, 32], // right heel to right foot index
    [27, 31], // left ankle to left foot index
    [28, 32], // right ankle to right foot index
];

/// COCO-Pose 17-keypoint topology.
pub const COCO: Topology = Topology {
    name: "coco",
    num_landmarks: 17,
    connections: &SKELETON,
};

/// COCO-Pose dataset skeleton structure (pairs of keypoint indices)
pub const SKELETON: [[usize; 2]; 19] = [
    [15, 13], // left ankle to left knee
    [13, 11], // left knee to left hip
    [16, 14], // right ankle to right knee
    [14, 12], // right knee to right hip
    [11, 12], // left hip to right hip
    [5, 11],  // left shoulder to left hip
    [6, 12],  // right shoulder to right hip
    [5, 6],   // left shoulder to right shoulder
    [5, 7],   // left shoulder to left elbow
    [6, 8],   // right shoulder to right elbow
    [7, 9],   // left elbow to left wrist
    [8, 10],  // right elbow to right wrist
    [1, 2],   // left eye to right eye
    [0, 1],   // nose to left eye
    [0, 2],   // nose to right eye
    [1, 3],   // left eye to left ear
    [2, 4],   // right eye to right ear
    [3, 5],   // left ear to left shoulder
    [4, 6],   // right ear to right shoulder
];

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_in_range(topology: &Topology) {
        for [a, b] in topology.connections {
            assert!(*a < topology.num_landmarks, "{} bone {a}-{b}", topology.name);
            assert!(*b < topology.num_landmarks, "{} bone {a}-{b}", topology.name);
            assert_ne!(a, b);
        }
    }

    #[test]
    fn test_connections_reference_valid_landmarks() {
        assert_in_range(&BLAZEPOSE);
        assert_in_range(&COCO);
    }

    #[test]
    fn test_sizes() {
        assert_eq!(BLAZEPOSE.num_landmarks, 33);
        assert_eq!(BLAZEPOSE.num_connections(), 35);
        assert_eq!(COCO.num_landmarks, 17);
        assert_eq!(COCO.num_connections(), 19);
    }
}
